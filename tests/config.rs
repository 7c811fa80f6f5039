use ferrous_resolver::{Container, IfAlreadyRegistered, Registration, Resolver, Rules, RulesConfig};
use serial_test::serial;
use std::env;
use std::sync::Arc;

const VARS: [&str; 4] = [
    "FERROUS_RESOLVER_DEFAULT_IF_ALREADY_REGISTERED",
    "FERROUS_RESOLVER_THROW_ON_REGISTERING_DISPOSABLE_TRANSIENT",
    "FERROUS_RESOLVER_TRACK_DISPOSABLE_TRANSIENTS",
    "FERROUS_RESOLVER_EAGER_CACHING_SINGLETONS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn empty_environment_yields_default_rules() {
    clear_env();
    let config = RulesConfig::from_env().unwrap();
    assert_eq!(config, RulesConfig::default());
    assert_eq!(config, RulesConfig::from_rules(&Rules::default()));
}

#[test]
#[serial]
fn environment_configures_container_rules() {
    clear_env();
    env::set_var("FERROUS_RESOLVER_DEFAULT_IF_ALREADY_REGISTERED", "keep");
    env::set_var("FERROUS_RESOLVER_EAGER_CACHING_SINGLETONS", "off");

    let config = RulesConfig::from_env().unwrap();
    clear_env();

    let container = Container::with(Rules::from_config(&config));
    assert!(!container.rules().eager_caching_singletons());

    container.register_instance(Arc::new(1u8)).unwrap();
    container.register(Registration::instance(Arc::new(2u8))).unwrap();
    assert_eq!(*container.resolve::<u8>().unwrap(), 1);
}

#[test]
#[serial]
fn unknown_policy_is_rejected() {
    clear_env();
    env::set_var("FERROUS_RESOLVER_DEFAULT_IF_ALREADY_REGISTERED", "overwrite");

    let result = RulesConfig::from_env();
    clear_env();

    let error = result.unwrap_err();
    assert!(error.to_string().contains("FERROUS_RESOLVER_DEFAULT_IF_ALREADY_REGISTERED"));
    assert!(error.to_string().contains("overwrite"));
}

#[test]
fn apply_preserves_non_configurable_rules() {
    let base = Rules::default().with_unknown_service_resolvers([ferrous_resolver::UnknownServiceResolver::new(|_| None)]);
    let config = RulesConfig {
        default_if_already_registered: IfAlreadyRegistered::Throw,
        ..RulesConfig::default()
    };

    let applied = config.apply(&base);
    assert_eq!(applied.unknown_service_resolvers().len(), 1);
    assert_eq!(applied.default_if_already_registered(), IfAlreadyRegistered::Throw);
}

#[cfg(feature = "config")]
mod json {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RulesConfig::from_json(r#"{ "track_disposable_transients": true }"#).unwrap();
        assert!(config.track_disposable_transients);
        assert!(config.eager_caching_singletons);
        assert_eq!(config.default_if_already_registered, IfAlreadyRegistered::AppendNotKeyed);
    }

    #[test]
    fn policies_use_snake_case_names() {
        let config = RulesConfig::from_json(r#"{ "default_if_already_registered": "replace_many" }"#).unwrap();
        assert_eq!(config.default_if_already_registered, IfAlreadyRegistered::ReplaceMany);

        let json = config.to_json().unwrap();
        assert_eq!(RulesConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_invalid_configuration() {
        assert!(matches!(
            RulesConfig::from_json("{ not json"),
            Err(ferrous_resolver::DiError::InvalidConfiguration { .. })
        ));
    }
}
