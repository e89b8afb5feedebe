use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

pub fn setup_tracing(debug: bool) -> Result<(), ParseError> {
    // Layer to output to stdout
    let stdout_layer = tracing_subscriber::fmt::layer();

    let (core_level, schema_level) = if debug {
        ("traflow_core=debug", "traflow_schema=debug")
    } else {
        ("traflow_core=info", "traflow_schema=info")
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(core_level.parse()?)
        .add_directive(schema_level.parse()?)
        // only display warnings from other crates
        .add_directive("warn".parse()?);

    let subscriber = Registry::default().with(stdout_layer).with(filter);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("A global tracing subscriber is already set; keeping it.");
    }

    Ok(())
}
