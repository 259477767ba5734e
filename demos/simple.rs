use std::sync::Arc;
use std::time::SystemTime;

use brick_engine::*;

// Define regular structs acting as modules

struct Logger;

impl Logger {
    fn log(&self, content: &str) {
        println!("{}", content);
    }
}

struct DateLogger {
    logger: Arc<Logger>,
}

impl DateLogger {
    fn log_date(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        self.logger.log(&format!("{}s since epoch", now.as_secs()));
    }
}

fn main() -> Result<(), BrickError> {
    logging::init_logging(&LoggingConfig::default())?;

    let logger = Module::constructor(|_: &Args| Ok(Logger)).named("logger", deps![])?;
    let date_logger = Module::constructor(|args: &Args| {
        Ok(DateLogger {
            logger: args.get(0)?,
        })
    })
    .named("date-logger", deps!["logger"])?;

    // modules are discovered in any order: the date logger waits for its dependency
    let loader = CatalogLoader::new()
        .with("app/date_logger", date_logger)
        .with("app/logger", logger);
    let engine = Engine::with_config(EngineConfig::default(), loader);

    engine.build(
        &["app/**"],
        &LoadOptions::default(),
        |built| {
            if let Ok(date_logger) = built.model.downcast::<DateLogger>() {
                date_logger.log_date();
            }
        },
        |e| eprintln!("{e}"),
    )?;

    for e in engine.take_unhandled() {
        eprintln!("{e}");
    }
    Ok(())
}
