use tracing_subscriber::{EnvFilter, prelude::*, registry};

pub fn init(executable_name: &str, json: bool) {
    let target = executable_name.replace('-', "_");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{target}=debug")));

    let log_default_layer = (!json).then(tracing_subscriber::fmt::layer);
    let log_json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
    });

    registry()
        .with(env_filter)
        .with(log_default_layer)
        .with(log_json_layer)
        .init();
}
