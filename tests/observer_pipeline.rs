//! Integration tests for the observer pipeline driven through the service.

use scoped_config::observer::{
    Configuration, Configurations, MinMaxInt, ObserverFactories, ValidatorArg,
};
use scoped_config::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn grid_per_page() -> Path {
    Path::new("catalog/frontend/grid_per_page").unwrap()
}

#[tokio::test]
async fn test_validator_chain_stops_at_first_rejection() {
    let factories = Arc::new(ObserverFactories::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&calls);
    factories.validators().register("probe", move |_: &[u8]| {
        probe.fetch_add(1, Ordering::SeqCst);
        true
    });

    let service = Service::builder()
        .with_factories(Arc::clone(&factories))
        .build()
        .unwrap();
    service
        .register_configurations(&Configurations::new(vec![Configuration::new(
            "catalog/frontend",
            Event::BeforeSet,
            "validator",
            json!({"funcs": ["int", "probe"]}),
        )]))
        .unwrap();

    let err = service.set(&grid_per_page(), "many").await.unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Interrupted { index: 0, ref name, .. } if name == "int"
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(service.lookup(&grid_per_page()).await.unwrap().is_none());

    service.set(&grid_per_page(), "24").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_partial_validation() {
    let path = Path::new("catalog/frontend/list_allow_all").unwrap();
    for (partial, accepted) in [(true, true), (false, false)] {
        let service = Service::builder().build().unwrap();
        let arg = ValidatorArg {
            funcs: vec!["int".to_string(), "bool".to_string()],
            partial_validation: partial,
            ..Default::default()
        };
        service
            .register_configurations(&Configurations::new(vec![Configuration::new(
                "catalog/frontend",
                Event::BeforeSet,
                "validator",
                serde_json::to_value(arg).unwrap(),
            )]))
            .unwrap();

        assert_eq!(service.set(&path, "true").await.is_ok(), accepted, "partial={}", partial);
    }
}

#[tokio::test]
async fn test_min_max_scenario() {
    for (partial, accepted) in [(false, false), (true, true)] {
        let service = Service::builder().build().unwrap();
        service
            .register_observer(
                Event::BeforeSet,
                "catalog/frontend/grid_per_page",
                Arc::new(MinMaxInt::new(&[1, 2, 5, 6, 7, 8], partial).unwrap()),
            )
            .unwrap();

        let result = service.set(&grid_per_page(), "6").await;
        assert_eq!(result.is_ok(), accepted, "partial={}", partial);
        if let Err(err) = result {
            assert!(matches!(err, ConfigError::OutOfRange { value: 6, .. }));
        }
    }
}

#[tokio::test]
async fn test_modifiers_on_read_and_write() {
    let batch = Configurations::from_json(
        br#"{
            "collection": [
                {"route": "web/cookie", "event": "before_set", "type": "modifier",
                 "condition": {"funcs": ["trim", "lower"]}},
                {"route": "web/cookie/cookie_path", "event": "after_get", "type": "modifier",
                 "condition": {"funcs": ["upper"]}}
            ]
        }"#,
    )
    .unwrap();
    let service = Service::builder()
        .with_observer_configurations(batch.clone())
        .build()
        .unwrap();

    let domain = Path::new("web/cookie/cookie_domain").unwrap();
    let cookie_path = Path::new("web/cookie/cookie_path").unwrap();
    service.set(&domain, "  CS.IO ").await.unwrap();
    service.set(&cookie_path, " /Shop").await.unwrap();

    assert_eq!(service.get(&domain).await.unwrap().as_str().unwrap(), "cs.io");
    assert_eq!(service.get(&cookie_path).await.unwrap().as_str().unwrap(), "/SHOP");
    assert_eq!(
        service.storage().get(&cookie_path).await.unwrap(),
        Some(b"/shop".to_vec())
    );

    assert_eq!(batch.deregister_observers(service.observers()).unwrap(), 2);
    assert_eq!(service.get(&cookie_path).await.unwrap().as_str().unwrap(), "/shop");
}

#[tokio::test]
async fn test_custom_observer_type() {
    let factories = Arc::new(ObserverFactories::new());
    factories
        .register_factory("max_length", |condition: &[u8]| -> Result<Arc<dyn Observer>> {
            let limit: usize = serde_json::from_slice(condition)
                .map_err(|e| ConfigError::NotValid(e.to_string()))?;
            Ok(Arc::new(move |path: &Path, raw: Vec<u8>, found: bool| -> Result<Vec<u8>> {
                if found && raw.len() > limit {
                    return Err(ConfigError::NotAcceptable(format!("{} exceeds {}", path, limit)));
                }
                Ok(raw)
            }))
        })
        .unwrap();

    let service = Service::builder()
        .with_factories(factories)
        .with_observer_configurations(Configurations::new(vec![Configuration::new(
            "design/head",
            Event::BeforeSet,
            "max_length",
            json!(8),
        )]))
        .build()
        .unwrap();

    let title = Path::new("design/head/default_title").unwrap();
    service.set(&title, "Shop").await.unwrap();
    assert!(service.set(&title, "A much longer title").await.unwrap_err().is_not_acceptable());
    assert_eq!(service.get(&title).await.unwrap().as_str().unwrap(), "Shop");
}

#[tokio::test]
async fn test_invalid_batch_registers_nothing() {
    let service = Service::builder().build().unwrap();
    let batch = Configurations::new(vec![
        Configuration::new("general/locale", Event::BeforeSet, "validator", json!({"funcs": ["locale"]})),
        Configuration::new("general/locale", Event::BeforeSet, "ValidateMinMaxInt", json!({"conditions": [3, 1]})),
    ]);
    assert!(service.register_configurations(&batch).unwrap_err().is_not_acceptable());
    assert!(service.observers().is_empty());

    let code = Path::new("general/locale/code").unwrap();
    service.set(&code, "not a locale").await.unwrap();
}
