use std::env;

use log::error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        let state = match nestegg::api::AppState::from_env() {
            Ok(state) => state,
            Err(e) => {
                error!("Catalog error: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = nestegg::api::run_http_server(port, state).await {
            error!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = nestegg::api::run_cli() {
        eprintln!("{e}");
        std::process::exit(2);
    }
}
