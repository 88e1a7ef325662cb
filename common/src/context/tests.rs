use std::time::Duration;

use super::*;

#[tokio::test]
async fn test_context_cancel() {
    let (ctx, handler) = Context::new();

    let handle = tokio::spawn(async move {
        ctx.done().await;
    });

    tokio::time::timeout(Duration::from_millis(300), handler.cancel())
        .await
        .expect("task should be cancelled");
    tokio::time::timeout(Duration::from_millis(300), handle)
        .await
        .expect("task should be cancelled")
        .expect("panic in task");
}

#[tokio::test]
async fn test_handler_done_on_drop() {
    let (ctx, mut handler) = Context::new();

    let cloned = ctx.clone();
    drop(ctx);

    // A clone is still alive, done() must not resolve yet.
    tokio::time::timeout(Duration::from_millis(100), handler.done())
        .await
        .expect_err("handler should still be waiting");

    drop(cloned);

    tokio::time::timeout(Duration::from_millis(300), handler.done())
        .await
        .expect("all contexts were dropped");
}

#[tokio::test]
async fn test_cancel_unblocks_many_holders() {
    let (ctx, handler) = Context::new();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        })
        .collect();

    drop(ctx);

    tokio::time::timeout(Duration::from_millis(300), handler.cancel())
        .await
        .expect("tasks should be cancelled");

    for task in tasks {
        task.await.expect("panic in task");
    }
}
