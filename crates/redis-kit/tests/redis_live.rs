//! 需要本地Redis（127.0.0.1:6379）的集成测试
//!
//! 运行方式：`cargo test -p redis-kit -- --ignored`

use futures::future::join_all;
use redis_kit::{execute_with_lock, RedisPoolManager, RedisSettings, RedisUtils};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn test_utils() -> RedisUtils {
    let settings = RedisSettings {
        max_total: 8,
        ..RedisSettings::default()
    };
    RedisUtils::new(Arc::new(RedisPoolManager::new(settings)))
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn only_one_competing_caller_gets_the_lock() {
    let redis = test_utils();
    let key = "pstoolkit:test:lock:compete";
    redis.del(&[key]).await.unwrap();

    let attempts = (0..5).map(|i| {
        let redis = redis.clone();
        async move {
            let owner = format!("owner-{i}");
            let acquired = redis.acquire_lock(key, &owner, Duration::from_secs(10)).await.unwrap();
            (owner, acquired)
        }
    });
    let results = join_all(attempts).await;

    let winners: Vec<_> = results.iter().filter(|(_, acquired)| *acquired).collect();
    assert_eq!(winners.len(), 1);

    let winner = &winners[0].0;
    assert_eq!(redis.get(key).await.unwrap().as_deref(), Some(winner.as_str()));
    assert!(redis.ttl(key).await.unwrap() > 0);

    redis.release_lock(key, winner).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn release_by_non_owner_is_a_noop() {
    let redis = test_utils();
    let key = "pstoolkit:test:lock:owner";
    redis.del(&[key]).await.unwrap();

    assert!(redis.acquire_lock(key, "alice", Duration::from_secs(10)).await.unwrap());
    assert!(!redis.release_lock(key, "bob").await.unwrap());
    assert_eq!(redis.get(key).await.unwrap().as_deref(), Some("alice"));

    // 持有者释放后其他人可以重新获取
    assert!(redis.release_lock(key, "alice").await.unwrap());
    assert!(redis.acquire_lock(key, "bob", Duration::from_secs(10)).await.unwrap());
    assert!(redis.release_lock(key, "bob").await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn guard_blocks_second_lock_until_released() {
    let redis = test_utils();
    let key = "pstoolkit:test:lock:guard";
    redis.del(&[key]).await.unwrap();

    let first = redis.lock(key, Duration::from_secs(10)).await.unwrap();
    let second = redis.lock(key, Duration::from_secs(10)).await.unwrap();
    assert_ne!(first.owner(), second.owner());

    let guard = first.try_acquire().await.unwrap().expect("first lock should succeed");
    assert!(second.try_acquire().await.unwrap().is_none());

    assert!(guard.release().await.unwrap());
    let guard = second.try_acquire().await.unwrap().expect("lock should be free again");
    assert!(guard.release().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn execute_with_lock_skips_operation_when_locked() {
    let redis = test_utils();
    let key = "pstoolkit:test:lock:execute";
    redis.del(&[key]).await.unwrap();
    let pool = redis.manager().pool().await.unwrap();

    let ran = execute_with_lock(&pool, key, Duration::from_secs(10), async { 42 }).await.unwrap();
    assert_eq!(ran, Some(42));
    assert!(!redis.exists(key).await.unwrap());

    assert!(redis.acquire_lock(key, "someone-else", Duration::from_secs(10)).await.unwrap());
    let skipped = execute_with_lock(&pool, key, Duration::from_secs(10), async { 42 }).await.unwrap();
    assert_eq!(skipped, None);
    redis.release_lock(key, "someone-else").await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn pool_is_recreated_after_shutdown() {
    let redis = test_utils();
    assert!(!redis.manager().is_initialized().await);

    assert!(redis.ping().await.unwrap());
    assert!(redis.manager().is_initialized().await);

    redis.manager().shutdown().await;
    assert!(!redis.manager().is_initialized().await);

    assert!(redis.ping().await.unwrap());
    assert!(redis.manager().is_initialized().await);
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn common_commands_round_trip() {
    let redis = test_utils();
    let key = "pstoolkit:test:kv";
    let hash = "pstoolkit:test:hash";
    let list = "pstoolkit:test:list";
    let set = "pstoolkit:test:set";
    redis.del(&[key, hash, list, set]).await.unwrap();

    redis.set_ex(key, 60, "10").await.unwrap();
    assert_eq!(redis.incr_by(key, 5).await.unwrap(), 15);
    assert_eq!(redis.decr_by(key, 3).await.unwrap(), 12);
    assert!(redis.ttl(key).await.unwrap() > 0);

    let fields = HashMap::from([("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]);
    redis.hmset(hash, &fields).await.unwrap();
    assert_eq!(
        redis.hmget(hash, &["b", "missing", "a"]).await.unwrap(),
        vec![Some("2".to_string()), None, Some("1".to_string())]
    );
    assert_eq!(redis.hdel(hash, &["a"]).await.unwrap(), 1);
    assert_eq!(redis.hgetall(hash).await.unwrap().len(), 1);

    assert_eq!(redis.lpush(list, &["x", "y"]).await.unwrap(), 2);
    assert_eq!(redis.rpop(list).await.unwrap().as_deref(), Some("x"));
    assert_eq!(
        redis.blpop(&[list], Duration::from_secs(1)).await.unwrap(),
        Some((list.to_string(), "y".to_string()))
    );

    assert_eq!(redis.sadd(set, &["m1", "m2", "m1"]).await.unwrap(), 2);
    assert_eq!(redis.srem(set, &["m2"]).await.unwrap(), 1);
    assert!(redis.smembers(set).await.unwrap().contains("m1"));

    assert_eq!(redis.del(&[key, hash, list, set]).await.unwrap(), 3);
}
