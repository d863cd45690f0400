use paperclip::actix::web;

use crate::handlers;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/author")
                .service(web::resource("/find/id").route(web::get().to(handlers::find_author)))
                .service(web::resource("/find/all").route(web::get().to(handlers::list_authors)))
                .service(web::resource("/save").route(web::post().to(handlers::save_author)))
                .service(web::resource("/delete").route(web::delete().to(handlers::delete_author))),
        )
        .service(
            web::scope("/book")
                .service(web::resource("/find/id").route(web::get().to(handlers::find_book)))
                .service(web::resource("/find/all").route(web::get().to(handlers::list_books)))
                .service(web::resource("/save").route(web::post().to(handlers::save_book)))
                .service(web::resource("/delete").route(web::delete().to(handlers::delete_book))),
        )
        .service(
            web::scope("/buy")
                .service(web::resource("/find/id").route(web::get().to(handlers::find_buy)))
                .service(web::resource("/find/all").route(web::get().to(handlers::list_buys)))
                .service(web::resource("/save").route(web::post().to(handlers::save_buy)))
                .service(web::resource("/delete").route(web::delete().to(handlers::delete_buy))),
        );
}
