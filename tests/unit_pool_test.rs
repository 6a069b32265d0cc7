use browsergate::core::errors::GatewayError;
use browsergate::core::pool::ContextPool;
use browsergate::driver::{BrowserProfile, SimDriver};
use std::sync::Arc;
use std::time::Duration;

fn profile() -> BrowserProfile {
    BrowserProfile {
        headless: true,
        viewport_width: 1280,
        viewport_height: 720,
    }
}

fn pool(driver: Arc<SimDriver>, warm: usize, ceiling: usize) -> ContextPool {
    ContextPool::new(
        driver,
        profile(),
        warm,
        ceiling,
        Duration::from_millis(100),
        Duration::from_secs(300),
    )
}

#[tokio::test]
async fn test_cold_acquire_creates_a_context() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 0, 4);

    assert_eq!(pool.idle_len(), 0);
    let ctx = pool.acquire().await.unwrap();
    assert_eq!(driver.contexts_created(), 1);
    assert_eq!(pool.in_use(), 1);
    pool.release(ctx).await;
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn test_release_recycles_and_acquire_reuses() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 0, 4);

    let ctx = pool.acquire().await.unwrap();
    pool.release(ctx).await;
    assert_eq!(pool.idle_len(), 1);

    let _ctx = pool.acquire().await.unwrap();
    // The warm context was reused; no second launch happened.
    assert_eq!(driver.contexts_created(), 1);
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_hard_ceiling_fails_fast() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 0, 1);

    let held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, GatewayError::ResourceExhausted));
    assert_eq!(err.error_code(), "RESOURCE_EXHAUSTED");

    pool.release(held).await;
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn test_maintain_reaches_warm_target() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 3, 8);

    pool.maintain().await;
    assert_eq!(pool.idle_len(), 3);
    assert_eq!(driver.contexts_created(), 3);

    // A second pass is a no-op at target.
    pool.maintain().await;
    assert_eq!(driver.contexts_created(), 3);
}

#[tokio::test]
async fn test_unhealthy_context_discarded_on_release() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 0, 4);

    let ctx = pool.acquire().await.unwrap();
    driver.poison_contexts();
    pool.release(ctx).await;
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_aged_context_discarded_on_release() {
    let driver = Arc::new(SimDriver::new());
    let pool = ContextPool::new(
        driver.clone(),
        profile(),
        0,
        4,
        Duration::from_millis(100),
        Duration::ZERO,
    );

    let ctx = pool.acquire().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    pool.release(ctx).await;
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_drain_closes_idle_contexts() {
    let driver = Arc::new(SimDriver::new());
    let pool = pool(driver.clone(), 2, 4);

    pool.maintain().await;
    assert_eq!(pool.idle_len(), 2);
    pool.drain().await;
    assert_eq!(pool.idle_len(), 0);
}
