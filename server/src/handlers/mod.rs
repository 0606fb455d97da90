use crate::connection::ws_index;
use actix_web::{web, HttpResponse};

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)))
        .service(web::resource("/ws/{room}").route(web::get().to(ws_index)));
}

pub async fn bad_request() -> HttpResponse {
    HttpResponse::BadRequest()
        .content_type("text/plain")
        .body("Bad Request")
}
