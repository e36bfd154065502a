use actix_files as fs;
use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, middleware::Logger, web, App, HttpRequest, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::error::{AppError, ValidationError};
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{auth, health_check, reservas};

/// Malformed or mistyped JSON bodies become a 400 in the usual error shape.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected request body");
    AppError::Validation(ValidationError::InvalidFormat("body".to_string())).into()
}

pub fn run(
    listener: TcpListener,
    auth_service: AuthService,
    static_dir: Option<String>,
) -> Result<Server, std::io::Error> {
    let jwt_config = auth_service.jwt_settings().clone();
    let auth_service = web::Data::new(auth_service);

    let server = HttpServer::new(move || {
        let app = App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(auth_service.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(auth::signup))
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh))
                    .route("/logout", web::post().to(auth::logout))
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(auth::me)),
                    ),
            )
            // Protected routes (require JWT authentication)
            .service(
                web::scope("/reservas")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("", web::post().to(reservas::create_reserva))
                    .route("", web::get().to(reservas::list_reservas))
                    // Registered before `/{id}` so "admin" is never parsed as an id.
                    .route("/admin/all", web::get().to(reservas::list_all_reservas))
                    .route("/{id}", web::get().to(reservas::get_reserva))
                    .route("/{id}", web::patch().to(reservas::update_reserva))
                    .route("/{id}", web::delete().to(reservas::delete_reserva)),
            );

        // Static file serving (must be last to not override API routes)
        match &static_dir {
            Some(dir) => app.service(fs::Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .listen(listener)?
    .run();

    Ok(server)
}
