//! Integration tests for scope fallback and scoped writes.

use scoped_config::core::{Origin, ScopeTypeID};
use scoped_config::prelude::*;
use scoped_config::storage::{LruStorage, MapStorage};
use std::sync::Arc;

fn base_url_field() -> Field {
    Field::new("web/unsecure/base_url")
        .unwrap()
        .with_default("{{base_url}}")
}

#[tokio::test]
async fn test_base_url_scenario() {
    let service = Service::builder().with_field(base_url_field()).build().unwrap();

    let path: Path = "stores/4/web/unsecure/base_url".parse().unwrap();
    let value = service.get(&path).await.unwrap();
    assert_eq!(value.as_str().unwrap(), "{{base_url}}");
    assert!(value.is_default());

    service
        .set(&path.bind_store(4), "http://cs.io")
        .await
        .unwrap();
    let value = service.get(&path).await.unwrap();
    assert_eq!(value.as_str().unwrap(), "http://cs.io");
    assert_eq!(value.origin(), Origin::Stored(ScopeTypeID::store(4)));

    let website: Path = "websites/0/web/unsecure/base_url".parse().unwrap();
    assert_eq!(
        service.get(&website).await.unwrap().as_str().unwrap(),
        "{{base_url}}"
    );
}

#[tokio::test]
async fn test_store_falls_back_to_website() {
    let service = Service::builder()
        .with_field(base_url_field())
        .with_store_website(4, 2)
        .with_store_website(5, 3)
        .build()
        .unwrap();

    let route = Path::new("web/unsecure/base_url").unwrap();
    service
        .set(&route.bind_website(2), "http://website2.io")
        .await
        .unwrap();

    for store in [4, 5] {
        let value = service.get(&route.bind_store(store)).await.unwrap();
        if store == 4 {
            assert_eq!(value.as_str().unwrap(), "http://website2.io");
            assert_eq!(value.scope(), Some(ScopeTypeID::website(2)));
        } else {
            assert!(value.is_default());
        }
    }

    service.set(&route, "http://default.io").await.unwrap();
    let value = service.get(&route.bind_store(5)).await.unwrap();
    assert_eq!(value.as_str().unwrap(), "http://default.io");
    assert_eq!(value.scope(), Some(ScopeTypeID::DEFAULT));
}

#[tokio::test]
async fn test_undeclared_field_without_value() {
    let service = Service::builder().build().unwrap();
    let path: Path = "stores/1/payment/checkmo/active".parse().unwrap();

    let err = service.get(&path).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(service.lookup(&path).await.unwrap().is_none());
}

#[tokio::test]
async fn test_scope_permissions() {
    let service = Service::builder()
        .with_field(
            Field::new("general/locale/code")
                .unwrap()
                .with_scopes(ScopePerm::DEFAULT | ScopePerm::WEBSITE),
        )
        .build()
        .unwrap();
    let route = Path::new("general/locale/code").unwrap();

    service.set(&route.bind_website(1), "de_CH").await.unwrap();
    let err = service.set(&route.bind_store(1), "fr_CH").await.unwrap_err();
    assert!(err.is_permission_denied());
    assert!(matches!(err, ConfigError::PermissionDenied { ref scope, .. } if scope == "stores"));
}

#[tokio::test]
async fn test_lru_in_front_of_map() {
    let map = Arc::new(MapStorage::new());
    let service = Service::builder()
        .with_storage(LruStorage::new(16).unwrap())
        .with_backends(vec![map.clone()])
        .with_field(base_url_field())
        .build()
        .unwrap();

    let path: Path = "websites/1/web/unsecure/base_url".parse().unwrap();
    service.set(&path, "http://cs.io").await.unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(service.get(&path).await.unwrap().as_str().unwrap(), "http://cs.io");
}

#[tokio::test]
async fn test_typed_values() {
    let service = Service::builder()
        .with_fields(vec![
            Field::new("catalog/frontend/grid_per_page").unwrap().with_default("12"),
            Field::new("catalog/frontend/list_allow_all").unwrap().with_default("1"),
            Field::new("catalog/frontend/grid_per_page_values")
                .unwrap()
                .with_default("9,15,30"),
        ])
        .build()
        .unwrap();

    let get = |route: &'static str| {
        let service = service.clone();
        async move { service.get(&Path::new(route).unwrap()).await.unwrap() }
    };
    assert_eq!(get("catalog/frontend/grid_per_page").await.as_i64().unwrap(), 12);
    assert!(get("catalog/frontend/list_allow_all").await.as_bool().unwrap());
    assert_eq!(
        get("catalog/frontend/grid_per_page_values")
            .await
            .as_csv(',')
            .unwrap(),
        vec!["9", "15", "30"]
    );
}
