use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use veritas::{
    Args, AsyncMap, AsyncMemoized, CacheOptions, Call, Error, FnMeta, Func, Function, Guarded,
    KeyPolicy, Memoized, Param, SyncAccess, SyncMap, args,
};

fn int(args: &Args, index: usize) -> i64 {
    args.get(index).and_then(|v| v.as_int()).unwrap_or(0)
}

/// A preemptible deposit function whose ledger is shared by all callers.
fn deposit(ledger: SyncMap<String, i64>) -> Guarded<impl Call<i64>> {
    let handle = ledger.clone();
    let meta = FnMeta::new("deposit")
        .with_doc("Add an amount to the running balance.")
        .with_param(Param::new("amount"))
        .with_param(Param::shared("shared", ledger));

    Guarded::new(Func::new(meta, move |args: &Args| {
        let amount = int(args, 0);
        handle.update("balance".into(), 0, |balance| balance + amount)
    }))
    .unwrap()
}

#[test]
fn test_no_lost_updates() {
    let ledger = SyncMap::new();
    let deposit = deposit(ledger.clone());

    thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                for _ in 0..100 {
                    deposit.call(&args![1]);
                }
            });
        }
    });

    assert_eq!(ledger.get("balance", 0), 1600);
    assert_eq!(deposit.meta().name(), "deposit");
}

#[test]
fn test_guard_exposes_the_declared_state() {
    let ledger = SyncMap::new();
    let deposit = deposit(ledger.clone());
    deposit.call(&args![5]);

    let state = deposit.state().unwrap();
    let shared = state.downcast_ref::<SyncMap<String, i64>>().unwrap();
    assert_eq!(shared.get("balance", 0), 5);
    shared.set("balance".into(), 0);
    assert_eq!(ledger.get("balance", 1), 0);
}

#[test]
fn test_memoized_guarded_function() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let meta = FnMeta::new("increment")
        .with_doc("Increment a number.")
        .with_param(Param::new("x"))
        .with_param(Param::with_default("noise", 0))
        .with_param(Param::shared("shared", SyncMap::<String, i64>::new()));

    let guarded = Guarded::new(Func::new(meta, move |args: &Args| {
        counter.fetch_add(1, Ordering::SeqCst);
        int(args, 0) + 1
    }))
    .unwrap();

    let options = CacheOptions::new().key(KeyPolicy::fields(["x"]));
    let increment = Memoized::with_options(guarded, options).unwrap();

    assert_eq!(increment.call(&args![1]), Ok(2));
    assert_eq!(increment.call(&args![1; noise = 7]), Ok(2));
    assert_eq!(increment.call(&args![; x = 1]), Ok(2));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(increment.call(&args![2]), Ok(3));
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    assert!(matches!(
        increment.call(&args![1, 2, 3, 4]),
        Err(Error::InvalidArguments { .. })
    ));
    assert!(matches!(
        increment.call(&args![; noise = 1]),
        Err(Error::MissingKeyField { .. })
    ));

    let meta = increment.meta();
    assert_eq!(meta.name(), "increment");
    assert_eq!(meta.doc(), Some("Increment a number."));
    assert!(increment.inner().state().is_some());
}

#[test]
fn test_cooperative_state_rejects_synchronous_use() {
    let map = AsyncMap::<String, i64>::new();
    let meta = FnMeta::new("lookup")
        .cooperative()
        .with_param(Param::shared("shared", map));
    let guarded = Guarded::new(Func::new(meta, |_: &Args| async { 0 })).unwrap();

    let state = guarded.state().unwrap();
    let map = state.downcast_ref::<AsyncMap<String, i64>>().unwrap();
    let access: &dyn SyncAccess<String, i64> = map;
    assert!(matches!(
        access.try_len(),
        Err(Error::WrongConcurrencyModel { container: "AsyncMap", .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cooperative_pipeline() {
    let views = AsyncMap::<String, i64>::new();
    let handle = views.clone();
    let meta = FnMeta::new("render")
        .cooperative()
        .with_param(Param::new("page"))
        .with_param(Param::shared("shared", views.clone()));

    let render = Guarded::new(Func::new(meta, move |args: &Args| {
        let views = handle.clone();
        let page = args.get(0).and_then(|v| v.as_str()).unwrap_or("").to_string();
        async move {
            views.update(page.clone(), 0, |n| n + 1).await;
            format!("<h1>{page}</h1>")
        }
    }))
    .unwrap();
    let render = Arc::new(AsyncMemoized::<_, String>::new(render));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let render = Arc::clone(&render);
            let page = if i % 2 == 0 { "home" } else { "about" };
            tokio::spawn(async move { render.call(&args![page]).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap().starts_with("<h1>"));
    }

    // Each page rendered exactly once.
    assert_eq!(views.get("home", 0).await, 1);
    assert_eq!(views.get("about", 0).await, 1);
    assert_eq!(render.len(), 2);
}
