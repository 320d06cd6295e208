//! 路由器集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrape_router::router::{
    Params, RequestOptions, RouteSpec, RouterBuilder, ScrapeAction, ScraperFactory,
};
use scrape_router::{Result, RouterConfig, RouterError};

/// 记录调用的抓取器
#[derive(Default)]
struct RecordingScraper {
    chain: Mutex<Vec<Params>>,
    gets: Mutex<Vec<String>>,
    requests: Mutex<Vec<RequestOptions>>,
    delay_ms: u64,
    fail: bool,
}

impl RecordingScraper {
    fn chains(&self) -> Vec<Params> {
        self.chain.lock().unwrap().clone()
    }

    fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<RequestOptions> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ScrapeAction for RecordingScraper {
    fn set_chain_parameter(&self, params: Params) {
        self.chain.lock().unwrap().push(params);
    }

    async fn get(&self, url: &str) -> Result<()> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.gets.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(RouterError::ScrapeFailed {
                url: url.to_string(),
                reason: "selector missing".to_string(),
            });
        }
        Ok(())
    }

    async fn request(&self, options: RequestOptions) -> Result<()> {
        self.requests.lock().unwrap().push(options);
        Ok(())
    }
}

/// 生成 `RecordingScraper` 的工厂
#[derive(Default)]
struct RecordingFactory {
    delay_ms: u64,
    fail: bool,
}

impl ScraperFactory for RecordingFactory {
    type Static = RecordingScraper;
    type Dynamic = RecordingScraper;

    fn create_static(&self) -> RecordingScraper {
        RecordingScraper {
            delay_ms: self.delay_ms,
            fail: self.fail,
            ..Default::default()
        }
    }

    fn create_dynamic(&self) -> RecordingScraper {
        self.create_static()
    }
}

/// 收集回调参数
#[derive(Clone, Default)]
struct Calls {
    otherwise: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<(String, String)>>>,
}

impl Calls {
    fn install<F: ScraperFactory>(&self, builder: &mut RouterBuilder<F>) {
        let otherwise = Arc::clone(&self.otherwise);
        builder
            .otherwise(move |url| otherwise.lock().unwrap().push(url.to_string()))
            .unwrap();
        let errors = Arc::clone(&self.errors);
        builder
            .on_error(move |error, url| {
                errors
                    .lock()
                    .unwrap()
                    .push((error.error_code().to_string(), url.to_string()))
            })
            .unwrap();
    }

    fn otherwise(&self) -> Vec<String> {
        self.otherwise.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().unwrap().clone()
    }
}

// ==================== 终结路径 ====================

#[tokio::test]
async fn test_user_route_scenario() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let user = builder.on("/user/:id").unwrap();
    builder.get(user).unwrap();
    let scraper = builder.create_static(user).unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let mut outcome = router.dispatch("/user/7").await;
    outcome.join_dispatches().await;

    assert!(outcome.matched);
    let chains = scraper.chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].url(), Some("/user/7"));
    assert_eq!(chains[0].get("id"), Some("7"));
    assert_eq!(chains[0].len(), 2);
    assert_eq!(scraper.gets(), vec!["/user/7".to_string()]);
    assert!(calls.otherwise().is_empty());
    assert!(calls.errors().is_empty());
}

#[tokio::test]
async fn test_route_callback_fires_once() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let user = builder.on("/user/:id").unwrap();
    builder.create_static(user).unwrap();
    let router = builder.build();

    let fired = AtomicUsize::new(0);
    let mut seen = None;
    router
        .route("/user/7", |matched| {
            fired.fetch_add(1, Ordering::SeqCst);
            seen = Some(matched);
        })
        .await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(seen, Some(true));
}

#[tokio::test]
async fn test_otherwise_scenario() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let x = builder.on("/x").unwrap();
    builder.get(x).unwrap();
    let scraper = builder.create_static(x).unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let mut result = None;
    router.route("/y", |matched| result = Some(matched)).await;

    assert_eq!(result, Some(false));
    assert_eq!(calls.otherwise(), vec!["/y".to_string()]);
    assert!(calls.errors().is_empty());
    assert!(scraper.chains().is_empty());
}

#[tokio::test]
async fn test_empty_router_never_errors() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let mut results = Vec::new();
    router.route("/a", |m| results.push(m)).await;
    router.route("/b", |m| results.push(m)).await;

    assert_eq!(results, vec![false, false]);
    assert_eq!(calls.otherwise(), vec!["/a".to_string(), "/b".to_string()]);
    assert!(calls.errors().is_empty());
}

#[tokio::test]
async fn test_missing_action_goes_to_on_error() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    builder.on("/orphan/:id").unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let outcome = router.dispatch("/orphan/1").await;

    assert!(outcome.matched);
    assert_eq!(outcome.matches.len(), 1);
    assert!(matches!(
        outcome.error,
        Some(RouterError::NoActionBound { route: 0, .. })
    ));
    assert_eq!(
        calls.errors(),
        vec![("ROUTER-001".to_string(), "/orphan/1".to_string())]
    );
    assert!(calls.otherwise().is_empty());
}

#[tokio::test]
async fn test_first_error_by_route_order() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    builder.on("/p/:id").unwrap();
    builder
        .on(RouteSpec::predicate(|_: &str| -> bool { panic!("bad predicate") }))
        .unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let outcome = router.dispatch("/p/1").await;

    assert!(matches!(
        outcome.error,
        Some(RouterError::NoActionBound { route: 0, .. })
    ));
    assert_eq!(calls.errors().len(), 1);
}

#[tokio::test]
async fn test_panicking_predicate_does_not_block_other_routes() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let bad = builder
        .on(RouteSpec::predicate(|_: &str| -> bool { panic!("bad predicate") }))
        .unwrap();
    builder.create_static(bad).unwrap();
    let good = builder.on("/ok").unwrap();
    let scraper = builder.create_static(good).unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let mut outcome = router.dispatch("/ok").await;
    outcome.join_dispatches().await;

    assert!(outcome.matched);
    assert_eq!(scraper.gets(), vec!["/ok".to_string()]);
    assert_eq!(calls.errors(), vec![("ROUTER-002".to_string(), "/ok".to_string())]);
    assert!(calls.otherwise().is_empty());
}

// ==================== 匹配与分发 ====================

#[tokio::test]
async fn test_all_matching_routes_are_dispatched() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let a = builder.on("/files/*").unwrap();
    let first = builder.create_static(a).unwrap();
    let b = builder.on("/files/:name").unwrap();
    let second = builder.create_dynamic(b).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/files/report").await;
    let results = outcome.join_dispatches().await;

    assert_eq!(results.len(), 2);
    assert_eq!(first.chains()[0].positional(1), Some("report"));
    assert_eq!(second.chains()[0].get("name"), Some("report"));
}

#[tokio::test]
async fn test_case_insensitive_template() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let route = builder.on("/A/:id").unwrap();
    let scraper = builder.create_static(route).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/a/5").await;
    outcome.join_dispatches().await;

    assert!(outcome.matched);
    assert_eq!(scraper.chains()[0].get("id"), Some("5"));
}

#[tokio::test]
async fn test_request_dispatch_overrides_uri() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let route = builder.on("/search/:q").unwrap();
    let mut options = RequestOptions::new().method("POST").body("page=1");
    options.uri = Some("/ignored".to_string());
    builder.request(route, options).unwrap();
    let scraper = builder.create_dynamic(route).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/search/rust").await;
    outcome.join_dispatches().await;

    let requests = scraper.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri.as_deref(), Some("/search/rust"));
    assert_eq!(requests[0].method, "POST");
    assert!(scraper.gets().is_empty());
}

#[tokio::test]
async fn test_regex_and_predicate_routes() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    let regex = builder
        .on(regex::Regex::new(r"^/item/(?P<id>\d+)$").unwrap())
        .unwrap();
    let by_regex = builder.create_static(regex).unwrap();
    let predicate = builder
        .on(RouteSpec::predicate(|url: &str| url.starts_with("/item/")))
        .unwrap();
    let by_predicate = builder.create_static(predicate).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/item/42").await;
    outcome.join_dispatches().await;

    assert_eq!(by_regex.chains()[0].get("id"), Some("42"));
    assert!(by_predicate.chains()[0].is_empty());
}

#[tokio::test]
async fn test_completion_does_not_wait_for_scrape() {
    let mut builder = RouterBuilder::new(RecordingFactory {
        delay_ms: 200,
        ..Default::default()
    });
    let route = builder.on("/slow").unwrap();
    let scraper = builder.create_static(route).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/slow").await;
    assert!(outcome.matched);
    assert!(scraper.gets().is_empty());

    outcome.join_dispatches().await;
    assert_eq!(scraper.gets(), vec!["/slow".to_string()]);
}

#[tokio::test]
async fn test_scrape_failure_is_not_routed_to_on_error() {
    let mut builder = RouterBuilder::new(RecordingFactory {
        fail: true,
        ..Default::default()
    });
    let route = builder.on("/broken").unwrap();
    builder.create_static(route).unwrap();
    let calls = Calls::default();
    calls.install(&mut builder);
    let router = builder.build();

    let mut outcome = router.dispatch("/broken").await;
    let results = outcome.join_dispatches().await;

    assert!(matches!(results[0], Err(RouterError::ScrapeFailed { .. })));
    assert!(outcome.error.is_none());
    assert!(calls.errors().is_empty());
    assert_eq!(router.stats().dispatch_failures, 1);
}

#[tokio::test]
async fn test_dispatch_timeout() {
    let config = RouterConfig {
        dispatch_timeout_ms: Some(20),
        ..Default::default()
    };
    let factory = RecordingFactory {
        delay_ms: 1000,
        ..Default::default()
    };
    let mut builder = RouterBuilder::with_config(factory, config);
    let route = builder.on("/slow").unwrap();
    builder.create_static(route).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/slow").await;
    let results = outcome.join_dispatches().await;

    assert!(matches!(results[0], Err(RouterError::Timeout(_))));
    assert_eq!(router.stats().dispatch_failures, 1);
}

#[tokio::test]
async fn test_first_match_mode() {
    let config = RouterConfig {
        first_match: true,
        max_concurrent: 1,
        ..Default::default()
    };
    let mut builder = RouterBuilder::with_config(RecordingFactory::default(), config);
    let a = builder.on("/news/:slug").unwrap();
    let first = builder.create_static(a).unwrap();
    let b = builder.on("/news/*").unwrap();
    let second = builder.create_static(b).unwrap();
    let router = builder.build();

    let mut outcome = router.dispatch("/news/today").await;
    outcome.join_dispatches().await;

    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(first.gets().len(), 1);
    assert!(second.gets().is_empty());
}

// ==================== 并发 ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_route_calls() {
    let mut builder = RouterBuilder::with_config(
        RecordingFactory::default(),
        RouterConfig {
            max_concurrent: 4,
            ..Default::default()
        },
    );
    let route = builder.on("/page/:n").unwrap();
    let scraper = builder.create_static(route).unwrap();
    for i in 0..20 {
        let other = builder.on(format!("/other{}/:n", i)).unwrap();
        builder.create_static(other).unwrap();
    }
    let router = Arc::new(builder.build());

    let mut handles = vec![];
    for n in 0..50 {
        let router = Arc::clone(&router);
        handles.push(tokio::spawn(async move {
            let mut outcome = router.dispatch(&format!("/page/{}", n)).await;
            outcome.join_dispatches().await;
            outcome.matched
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(scraper.gets().len(), 50);

    let stats = router.stats();
    assert_eq!(stats.total_calls, 50);
    assert_eq!(stats.matched_calls, 50);
    assert_eq!(stats.dispatched, 50);
}

/// 并发评估计数：记录同时处于评估中的谓词数的峰值
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    evaluated: AtomicUsize,
}

/// 构建 `routes` 条阻塞谓词路由，返回路由器和计数
fn build_slow_predicates(routes: usize, max_concurrent: usize) -> (scrape_router::Router, Arc<InFlight>) {
    let in_flight = Arc::new(InFlight::default());
    let mut builder = RouterBuilder::with_config(
        RecordingFactory::default(),
        RouterConfig {
            max_concurrent,
            ..Default::default()
        },
    );
    for _ in 0..routes {
        let in_flight = Arc::clone(&in_flight);
        builder
            .on(RouteSpec::predicate(move |_: &str| {
                let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
                in_flight.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(15));
                in_flight.current.fetch_sub(1, Ordering::SeqCst);
                in_flight.evaluated.fetch_add(1, Ordering::SeqCst);
                false
            }))
            .unwrap();
    }
    (builder.build(), in_flight)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_max_concurrent_bounds_evaluation() {
    let (router, in_flight) = build_slow_predicates(8, 1);

    let outcome = router.dispatch("/anything").await;

    assert!(!outcome.matched);
    assert_eq!(in_flight.evaluated.load(Ordering::SeqCst), 8);
    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_max_concurrent_bound_holds_across_callers() {
    let (router, in_flight) = build_slow_predicates(4, 2);
    let router = Arc::new(router);

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.dispatch(&format!("/page/{}", i)).await.matched })
        })
        .collect();
    for handle in handles {
        assert!(!handle.await.unwrap());
    }

    assert_eq!(in_flight.evaluated.load(Ordering::SeqCst), 12);
    assert!(in_flight.peak.load(Ordering::SeqCst) <= 2);
}

// ==================== 误用错误 ====================

#[tokio::test]
async fn test_misuse_errors_are_synchronous() {
    let mut builder = RouterBuilder::new(RecordingFactory::default());
    assert!(matches!(builder.current(), Err(RouterError::NoRouteDeclared)));

    let route = builder.on("/a").unwrap();
    builder.create_static(route).unwrap();
    let err = builder.create_static(route).err().unwrap();
    assert!(err.is_misuse());
    assert!(matches!(err, RouterError::ActionAlreadyBound(0)));

    builder.otherwise(|_| {}).unwrap();
    assert!(builder.otherwise(|_| {}).err().unwrap().is_misuse());
}
