//! Todo App Example
//!
//! Demonstrates peasy with a todo list and a counter.
//! Saving goes through an async effect that talks to a pretend backend,
//! with an optimistic mutator previewing the result first.
//!
//! Run with `RUST_LOG=peasy_core=trace` to watch the update pipeline.

use peasy_core::{Error, Model, Outcome, Store, StoreConfig, Value};
use peasy_journal::{Auditor, Exporter, Journal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn todo(title: &Value) -> Value {
    Value::map([("title", title.clone()), ("done", Value::Bool(false))])
}

fn todos() -> Model {
    Model::new()
        .data("items", Value::list(Vec::<Value>::new()))
        .data("saving", false)
        .mutator("add", |draft, title, _| {
            draft.push("items", todo(title))?;
            draft.set("saving", false)?;
            Ok(Outcome::Commit)
        })
        .mutator("toggle", |draft, index, _| {
            let index = index.as_int().ok_or_else(|| Error::TypeError {
                expected: "int".to_string(),
                got: index.type_name().to_string(),
            })?;
            draft.update(format!("items.{}.done", index), |done| {
                *done = Value::Bool(!done.as_bool().unwrap_or(false));
            })?;
            Ok(Outcome::Commit)
        })
        .mutator("preview", |draft, title, _| {
            // What the list would look like; the backend confirms later
            draft.set("saving", true)?;
            draft.push("items", todo(title))?;
            info!(items = ?draft.get("items"), "optimistic preview");
            Ok(Outcome::Defer)
        })
        .effect("save", |dispatch, title, ctx| async move {
            dispatch.call("todos.preview", title.clone())?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            let before = ctx.get_state()?;
            info!(?before, "backend accepted {}", title);
            dispatch.call("todos.add", title)?;
            Ok(())
        })
}

fn counter() -> Model {
    Model::new()
        .data("value", 0i64)
        .mutator("increment", |draft, amount, _| {
            let value = draft.get_int("value")?;
            draft.set("value", value + amount.as_int().unwrap_or(1))?;
            Ok(Outcome::Commit)
        })
}

#[tokio::main]
async fn main() -> peasy_journal::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Peasy Todo App Example ===\n");

    let model = Model::new()
        .data("title", "groceries")
        .namespace("todos", todos())
        .namespace("counter", counter());

    let journal = Arc::new(Journal::new());
    let config = StoreConfig::new()
        .with_dev_tools(true)
        .with_inspector(journal.clone())
        .with_spawner(Arc::new(tokio::runtime::Handle::current()));
    let store = Store::new(model, config)?;

    let changes = Arc::new(AtomicUsize::new(0));
    let seen = changes.clone();
    let subscription = store.subscribe(move || {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    println!("Actions:");
    for name in store.actions().names() {
        println!("  {}", name);
    }
    println!("\nInitial state: {}\n", store.get_state());

    // Mutators apply synchronously
    store.call("counter.increment", 5i64)?;
    store.call("todos.add", "bread")?;
    store.call("todos.toggle", 0i64)?;

    // Effects start on the runtime right away; the saves run concurrently
    let saves: Vec<_> = ["milk", "eggs", "butter"]
        .into_iter()
        .map(|title| store.call("todos.save", title))
        .collect::<peasy_core::Result<_>>()?;
    println!("After starting saves: {}\n", store.get_state());

    for save in saves {
        save.settle().await?;
    }

    // Prints the whole state as JSON
    store.call("logState", ())?;

    store.unsubscribe(subscription);
    println!(
        "\nListeners were notified {} times",
        changes.load(Ordering::Relaxed)
    );

    let recording = journal.recording();
    println!("\n{}", Auditor::new(&recording).generate_report());
    println!("{}", Exporter::new(&recording).to_text());

    Ok(())
}
