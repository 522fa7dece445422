use clap::Parser;
use flightdesk::cli::{
    Args, build_config, handle_grant_admin, init_logging, load_secrets, open_database,
    validate_origin,
};
use flightdesk::{create_app, init_cleanup, run_server};
use tracing::{error, info};
use url::Url;

// Secrets are read and scrubbed from the environment before the runtime
// starts any worker threads.
fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some((jwt_secret, refresh_secret)) = load_secrets(&args) else {
        std::process::exit(1);
    };

    let allowed_origin = match args.allowed_origin.as_deref() {
        Some(origin) => match validate_origin(origin) {
            Some(url) => Some(url),
            None => std::process::exit(1),
        },
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        });

    runtime.block_on(serve(args, jwt_secret, refresh_secret, allowed_origin));
}

async fn serve(
    args: Args,
    jwt_secret: String,
    refresh_secret: String,
    allowed_origin: Option<Url>,
) {
    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(email) = args.grant_admin.as_deref() {
        handle_grant_admin(&db, email).await;
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, jwt_secret, refresh_secret, allowed_origin);
    init_cleanup(&config).await;
    let app = create_app(&config);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(app, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
