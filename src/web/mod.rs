pub mod builder;
pub mod index;
pub mod login;
pub mod logout;
pub mod respond;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Route resolution stops at the first match.
    index::configure(conf);
    builder::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    respond::configure(conf);

    conf.service(crate::create_user::create_user_post);
}
