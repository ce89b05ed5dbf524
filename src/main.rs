use bitevent::{events, init_logging, with_default, with_nothing, with_payload};
use bitevent::{ListenerRegistry, MiddlewareRegistry, StaticEvents};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let (provider, hook, statics) = events(
        MiddlewareRegistry::new()
            .with("press", with_payload())
            .with("reset", with_nothing())
            .with("login", with_default(json!({ "id": 0, "name": "anon" }))),
    );

    let root = provider.mount()?;
    let counter = hook.bind(
        ListenerRegistry::new()
            .on("press", |payload| tracing::info!("press: {}", payload))
            .on("login", |payload| tracing::info!("login: {}", payload)),
    );
    let audit = statics.subscribe(
        ListenerRegistry::new().on("reset", |_| tracing::info!("reset seen by static subscriber")),
    );

    let buttons = hook.bind_none();
    buttons.dispatch("press", vec![json!({ "count": 1 })])?;
    buttons.dispatch("login", vec![])?;
    buttons.dispatch("login", vec![json!({ "id": 7 })])?;
    reset_from_outside(&statics)?;

    drop(counter);
    let status = buttons.dispatch("press", vec![json!({ "count": 2 })])?;
    tracing::info!("press after unbind: {:?}", status);

    audit.unsubscribe();
    root.unmount();
    Ok(())
}

fn reset_from_outside(statics: &StaticEvents<&'static str>) -> bitevent::Result<()> {
    let status = statics.dispatch("reset", vec![])?;
    tracing::info!("static reset: {:?}", status);
    Ok(())
}
