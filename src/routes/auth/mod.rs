pub mod auth_routes;
