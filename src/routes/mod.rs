use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;

use access::{
    get_approved_access, get_pending_requests, get_relationship_status, grant_access,
    request_access, respond_access, revoke_access,
};
use auth::auth_routes::{get_profile, login, register};
use records::{
    delete_record, fetch_blob, get_download_link, get_my_records, get_patient_records,
    upload_record,
};

mod access;
mod auth;
mod health_check;
mod records;

use crate::routes::health_check::*;

fn auth_routes() -> Scope {
    scope("auth")
        .service(register)
        .service(login)
        .service(get_profile)
}

fn access_routes() -> Scope {
    scope("access")
        .service(request_access)
        .service(grant_access)
        .service(respond_access)
        .service(revoke_access)
        .service(get_pending_requests)
        .service(get_approved_access)
        .service(get_relationship_status)
}

fn records_routes() -> Scope {
    scope("records")
        .service(get_my_records)
        .service(fetch_blob)
        .service(get_patient_records)
        .service(get_download_link)
        .service(upload_record)
        .service(delete_record)
}

fn util_routes() -> Scope {
    scope("").service(health_check)
}

pub fn carevault_routes(conf: &mut ServiceConfig) {
    conf.service(
        scope("api/v1")
            .service(auth_routes())
            .service(access_routes())
            .service(records_routes())
            .service(util_routes()),
    );
}
