use std::sync::Arc;
use std::time::SystemTime;

use bindgraph::*;
use tracing_subscriber::EnvFilter;

// Define regular traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

trait DateLogger: Send + Sync {
    fn log_date(&self);
}

struct LoggerImpl {
    prefix: Arc<String>,
}

impl Logger for LoggerImpl {
    fn log(&self, content: &str) {
        println!("[{}] {}", self.prefix, content);
    }
}

struct DateLoggerImpl {
    logger: Arc<dyn Logger>,
}

impl DateLoggerImpl {
    fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl DateLogger for DateLoggerImpl {
    fn log_date(&self) {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap();
        self.logger.log(&format!("{}s since epoch", now.as_secs()));
    }
}

// Group the logging bindings in a module

fn log_module(registry: &Registry) -> Result<()> {
    registry.register(Binding::singleton_value(
        Key::<String>::named("prefix"),
        "demo".to_string(),
    ))?;
    registry.register(
        Binding::singleton(
            Key::<dyn Logger>::new(),
            (Key::<String>::named("prefix"),),
            |(prefix,)| Ok(Arc::new(LoggerImpl { prefix }) as Arc<dyn Logger>),
        )
        .eager(),
    )?;
    registry.register_transient(
        Key::<dyn DateLogger>::new(),
        (Key::<dyn Logger>::new(),),
        |(logger,)| Ok(Arc::new(DateLoggerImpl::new(logger)) as Arc<dyn DateLogger>),
    )?;
    registry.on_init(&Key::<dyn Logger>::new(), |_, logger| {
        logger.log("logger ready");
        Ok(())
    })
}

fn main() -> Result<(), WiringError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = Registry::new();
    registry.register_module(&log_module)?;
    registry.seal()?;

    let container = Container::new(&registry)?;
    let b: Arc<dyn DateLogger> = container.resolve(&Key::new())?;
    b.log_date();

    let lazy = container.lazy(&Key::<dyn DateLogger>::new());
    lazy.get()?.log_date();

    Ok(())
}
