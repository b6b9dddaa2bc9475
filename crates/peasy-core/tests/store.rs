use futures::executor::block_on;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use peasy_core::{
    compile, initial_state, ActionKind, ActionMessage, Dispatched, Error, Inspector, Message,
    Model, Outcome, Path, Store, StoreConfig, Value,
};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

fn counter() -> Model {
    Model::new()
        .data("value", 0i64)
        .mutator("increment", |draft, amount, _| {
            let value = draft.get_int("value")?;
            draft.set("value", value + amount.as_int().unwrap_or(1))?;
            Ok(Outcome::Commit)
        })
}

fn todos() -> Model {
    Model::new()
        .data("items", Value::list(Vec::<Value>::new()))
        .data("saving", false)
        .mutator("add", |draft, title, _| {
            draft.push("items", title.clone())?;
            Ok(Outcome::Commit)
        })
        .mutator("save_optimistic", |draft, title, _| {
            draft.set("saving", true)?;
            draft.push("items", title.clone())?;
            Ok(Outcome::Defer)
        })
        .effect("save", |dispatch, title, _ctx| async move {
            dispatch.call("todos.add", title)?;
            Ok(())
        })
        .effect("fail", |_, _, _| async { Err(Error::effect("backend unavailable")) })
}

fn store(model: Model) -> Store {
    Store::new(model, StoreConfig::default()).expect("model compiles")
}

fn at(state: &Value, path: &str) -> Value {
    state.get_path(&Path::from(path)).cloned().unwrap_or_default()
}

#[test]
fn test_counter_example() {
    let store = store(Model::new().namespace("counter", counter()));
    assert_eq!(
        store.get_state(),
        Value::map([("counter", Value::map([("value", 0i64)]))])
    );

    store.call("counter.increment", 5i64).unwrap();
    assert_eq!(
        store.get_state(),
        Value::map([("counter", Value::map([("value", 5i64)]))])
    );
}

#[test]
fn test_initial_state_is_data_projection() {
    let model = Model::new()
        .data("version", 3i64)
        .namespace("todos", todos())
        .namespace(
            "settings",
            Model::new()
                .data("theme", "dark")
                .namespace("nested", Model::new().data("empty", Value::Null)),
        );
    let store = store(model.clone());
    assert_eq!(store.get_state(), initial_state(&model));
    assert_eq!(
        store.get_state(),
        Value::map([
            ("version", Value::Int(3)),
            (
                "todos",
                Value::map([
                    ("items", Value::list(Vec::<Value>::new())),
                    ("saving", Value::Bool(false)),
                ]),
            ),
            (
                "settings",
                Value::map([
                    ("theme", Value::from("dark")),
                    ("nested", Value::map([("empty", Value::Null)])),
                ]),
            ),
        ])
    );
}

#[test]
fn test_independent_namespaces_keep_identity() {
    let store = store(
        Model::new()
            .namespace("a", counter())
            .namespace("b", counter()),
    );
    let before = store.get_state();
    store.call("a.increment", 1i64).unwrap();
    let after = store.get_state();

    assert_eq!(at(&after, "a.value"), Value::Int(1));
    assert!(after.child("b").unwrap().same(before.child("b").unwrap()));
}

#[test]
fn test_direct_match_equals_compiled_mutator() {
    let model = Model::new().namespace("counter", counter());
    let store = store(model.clone());
    let before = store.get_state();

    let handlers = compile(&model).unwrap();
    let peasy_core::Handler::Namespace(ns) = handlers.get("counter").unwrap() else {
        panic!("expected namespace");
    };
    let mutator = ns.mutators().next().unwrap();
    let env = peasy_core::Env::new(store.dispatcher(), before.clone());
    let expected = mutator
        .apply(before.child("counter").unwrap(), &Value::Int(7), &env)
        .unwrap();

    store
        .dispatch(ActionMessage::new("counter.increment", 7i64))
        .unwrap();
    assert_eq!(store.get_state().child("counter"), Some(&expected));
}

#[test]
fn test_compilation_is_deterministic() {
    let build = || {
        Model::new()
            .namespace("todos", todos())
            .namespace("z", Model::new().namespace("counter", counter()))
            .namespace("a", counter())
    };
    let first = store(build());
    let second = store(build());
    assert_eq!(first.actions().names(), second.actions().names());
    assert_eq!(first.actions().shape(), second.actions().shape());
    assert_eq!(
        first.actions().names(),
        vec![
            "todos.add",
            "todos.save_optimistic",
            "todos.save",
            "todos.fail",
            "z.counter.increment",
            "a.increment",
            ".logState",
        ]
    );
}

#[test]
fn test_action_tree_kinds() {
    let store = store(Model::new().namespace("todos", todos()));
    assert_eq!(
        store.action("todos.add").unwrap().kind(),
        ActionKind::Mutator
    );
    assert_eq!(store.action("todos.save").unwrap().kind(), ActionKind::Effect);
    assert!(matches!(
        store.action("todos.items"),
        Err(Error::ActionNotFound(_))
    ));
}

#[test]
fn test_collision_fails_at_compile_time() {
    let model = Model::new()
        .namespace("x.y", counter())
        .namespace("x", Model::new().namespace("y", counter()));
    let err = Store::new(model, StoreConfig::default()).unwrap_err();
    assert!(matches!(err, Error::ActionNameCollision { .. }));
}

#[test]
fn test_optimistic_defer_leaves_state_value_equal() {
    let store = store(Model::new().namespace("todos", todos()));
    let before = store.get_state();
    store.call("todos.save_optimistic", "milk").unwrap();
    assert_eq!(store.get_state(), before);
}

#[test]
fn test_effect_does_not_change_state_synchronously() {
    let store = store(Model::new().namespace("todos", todos()));
    let before = store.get_state();

    let dispatched = store.call("todos.save", "milk").unwrap();
    assert!(dispatched.is_task());
    assert!(store.get_state().same(&before));

    block_on(dispatched.settle()).unwrap();
    assert_eq!(
        at(&store.get_state(), "todos.items"),
        Value::list(["milk"])
    );
}

#[test]
fn test_effect_error_comes_through_the_future() {
    let store = store(Model::new().namespace("todos", todos()));
    let before = store.get_state();
    let dispatched = store.call("todos.fail", ()).unwrap();
    let err = block_on(dispatched.settle()).unwrap_err();
    assert!(matches!(err, Error::Effect(_)));
    assert!(store.get_state().same(&before));
}

#[test]
fn test_raw_task_dispatch() {
    let store = store(Model::new().namespace("counter", counter()));
    let dispatched = store
        .dispatch(Message::task(|dispatch| {
            Box::pin(async move {
                dispatch.call("counter.increment", 2i64)?;
                dispatch.call("counter.increment", 3i64)?;
                Ok::<(), Error>(())
            })
        }))
        .unwrap();
    assert_eq!(at(&store.get_state(), "counter.value"), Value::Int(0));
    block_on(dispatched.settle()).unwrap();
    assert_eq!(at(&store.get_state(), "counter.value"), Value::Int(5));
}

#[test]
fn test_dispatch_from_mutator_runs_after_commit() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let log = order.clone();
    let model = Model::new().namespace(
        "game",
        Model::new()
            .data("score", 0i64)
            .data("bonus", false)
            .mutator("score", move |draft, points, ctx| {
                log.lock().push("score");
                let score = draft.get_int("score")? + points.as_int().unwrap_or(0);
                draft.set("score", score)?;
                if score >= 10 {
                    let queued = ctx.dispatch_local("award", ())?;
                    assert!(matches!(queued, Dispatched::Queued));
                }
                Ok(Outcome::Commit)
            })
            .mutator("award", {
                let log = order.clone();
                move |draft, _, ctx| {
                    log.lock().push("award");
                    // the score update above is already committed
                    let committed = ctx.get_state().get_path(&Path::from("game.score")).cloned();
                    assert_eq!(committed, Some(Value::Int(10)));
                    draft.set("bonus", true)?;
                    Ok(Outcome::Commit)
                }
            }),
    );
    let store = store(model);
    let dispatched = store.call("game.score", 10i64).unwrap();
    assert!(matches!(dispatched, Dispatched::Applied));

    let state = store.get_state();
    assert_eq!(at(&state, "game.score"), Value::Int(10));
    assert_eq!(at(&state, "game.bonus"), Value::Bool(true));
    assert_eq!(*order.lock(), vec!["score", "award"]);
}

#[test]
fn test_dispatch_local_reaches_nested_child() {
    let model = Model::new().namespace(
        "game",
        Model::new()
            .data("score", 0i64)
            .mutator("score", |draft, points, ctx| {
                let score = draft.get_int("score")? + points.as_int().unwrap_or(0);
                draft.set("score", score)?;
                ctx.dispatch_local("stats.record", points.clone())?;
                Ok(Outcome::Commit)
            })
            .namespace(
                "stats",
                Model::new()
                    .data("rounds", 0i64)
                    .mutator("record", |draft, _, _| {
                        let rounds = draft.get_int("rounds")?;
                        draft.set("rounds", rounds + 1)?;
                        Ok(Outcome::Commit)
                    }),
            ),
    );
    let store = store(model);
    store.call("game.score", 4i64).unwrap();

    let state = store.get_state();
    assert_eq!(at(&state, "game.score"), Value::Int(4));
    assert_eq!(at(&state, "game.stats.rounds"), Value::Int(1));
}

#[test]
fn test_dispatch_local_to_missing_action_fails() {
    let model = Model::new().namespace(
        "game",
        Model::new().mutator("broken", |_, _, ctx| {
            ctx.dispatch_local("missing", ())?;
            Ok(Outcome::Commit)
        }),
    );
    let store = store(model);
    let err = store.call("game.broken", ()).unwrap_err();
    assert!(matches!(err, Error::Mutator { .. }));
}

#[test]
fn test_unknown_action_is_a_no_op() {
    let store = store(Model::new().namespace("counter", counter()));
    let before = store.get_state();
    store
        .dispatch(ActionMessage::new("counter.decrement", 1i64))
        .unwrap();
    assert!(store.get_state().same(&before));
}

#[test]
fn test_concurrent_dispatches_are_serialized() {
    let store = store(Model::new().namespace("counter", counter()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = store.dispatcher();
            thread::spawn(move || {
                for _ in 0..50 {
                    dispatcher.call("counter.increment", 1i64).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // Each thread waited for the writer turn and applied its own increments
    assert_eq!(at(&store.get_state(), "counter.value"), Value::Int(200));
}

#[test]
fn test_failed_dispatch_does_not_drop_another_threads_action() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let model = Model::new()
        .namespace("counter", counter())
        .mutator("slow_fail", {
            let entered = entered.clone();
            let release = release.clone();
            move |_, _, _| {
                entered.wait();
                release.wait();
                Err(Error::mutator("slow_fail", "backend rejected"))
            }
        });
    let store = store(model);

    let failing = {
        let dispatcher = store.dispatcher();
        thread::spawn(move || dispatcher.call("slow_fail", ()))
    };
    entered.wait();
    let other = {
        let dispatcher = store.dispatcher();
        thread::spawn(move || dispatcher.call("counter.increment", 1i64))
    };
    thread::sleep(Duration::from_millis(50));
    // the increment waits for the writer instead of queueing behind it
    assert_eq!(at(&store.get_state(), "counter.value"), Value::Int(0));
    release.wait();

    let err = failing.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::Mutator { .. }));
    let applied = other.join().unwrap().unwrap();
    assert!(matches!(applied, Dispatched::Applied));
    assert_eq!(at(&store.get_state(), "counter.value"), Value::Int(1));
}

#[test]
fn test_spawner_runs_effect_when_result_is_dropped() {
    let (ran, seen) = mpsc::channel();
    let model = Model::new().effect("ping", move |_, _, _| {
        let ran = ran.clone();
        async move {
            let _ = ran.send(());
            Ok(())
        }
    });
    let spawner = |task: BoxFuture<'static, ()>| {
        thread::spawn(move || block_on(task));
    };
    let store = Store::new(model, StoreConfig::new().with_spawner(Arc::new(spawner))).unwrap();

    let dispatched = store.call("ping", ()).unwrap();
    assert!(dispatched.is_spawned());
    drop(dispatched);
    assert!(seen.recv_timeout(Duration::from_secs(5)).is_ok());
}

#[test]
fn test_spawned_effect_result_is_reported() {
    let spawner = |task: BoxFuture<'static, ()>| {
        thread::spawn(move || block_on(task));
    };
    let config = StoreConfig::new().with_spawner(Arc::new(spawner));
    let store = Store::new(Model::new().namespace("todos", todos()), config).unwrap();

    block_on(store.call("todos.save", "milk").unwrap().settle()).unwrap();
    assert_eq!(at(&store.get_state(), "todos.items"), Value::list(["milk"]));

    let err = block_on(store.call("todos.fail", ()).unwrap().settle()).unwrap_err();
    assert!(matches!(err, Error::Effect(_)));
}

#[test]
fn test_mutator_starts_effect_through_spawner() {
    let model = Model::new().namespace(
        "todos",
        todos().mutator("request", |draft, title, ctx| {
            draft.set("saving", true)?;
            let started = ctx.dispatch_local("save", title.clone())?;
            assert!(started.is_spawned());
            Ok(Outcome::Commit)
        }),
    );
    // Runs the effect inline; its follow-up dispatch is queued behind the
    // running mutator
    let inline = |task: BoxFuture<'static, ()>| block_on(task);
    let config = StoreConfig::new().with_spawner(Arc::new(inline));
    let store = Store::new(model, config).unwrap();

    store.call("todos.request", "milk").unwrap();
    let state = store.get_state();
    assert_eq!(at(&state, "todos.saving"), Value::Bool(true));
    assert_eq!(at(&state, "todos.items"), Value::list(["milk"]));
}

#[derive(Default)]
struct Recorder {
    inits: Mutex<Vec<Value>>,
    actions: Mutex<Vec<(String, Value)>>,
}

impl Inspector for Recorder {
    fn on_init(&self, state: &Value) {
        self.inits.lock().push(state.clone());
    }

    fn on_action(&self, msg: &ActionMessage, state: &Value) {
        self.actions.lock().push((msg.kind.clone(), state.clone()));
    }
}

#[test]
fn test_inspector_sees_every_action() {
    let recorder = Arc::new(Recorder::default());
    let config = StoreConfig::new()
        .with_dev_tools(true)
        .with_inspector(recorder.clone());
    let store = Store::new(Model::new().namespace("counter", counter()), config).unwrap();
    store.call("counter.increment", 2i64).unwrap();
    store.call("counter.increment", 3i64).unwrap();

    assert_eq!(recorder.inits.lock().len(), 1);
    let actions = recorder.actions.lock();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1].0, "counter.increment");
    assert_eq!(at(&actions[1].1, "counter.value"), Value::Int(5));
}

#[test]
fn test_inspector_ignored_without_dev_tools() {
    let recorder = Arc::new(Recorder::default());
    let config = StoreConfig::new().with_inspector(recorder.clone());
    let store = Store::new(Model::new().namespace("counter", counter()), config).unwrap();
    store.call("counter.increment", 1i64).unwrap();
    assert!(recorder.inits.lock().is_empty());
    assert!(recorder.actions.lock().is_empty());
}

#[test]
fn test_state_renders_as_plain_ron() {
    let store = store(Model::new().namespace("counter", counter()));
    let text = ron::to_string(&store.get_state()).unwrap();
    assert!(text.contains("counter"));
    assert!(!text.contains("Map"));
    assert!(!text.contains("Int"));
}
