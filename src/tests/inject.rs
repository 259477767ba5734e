use super::*;

#[test]
fn normalization_fills_defaults() {
    let dep = Dependency::normalize("db").unwrap();

    assert_eq!(dep.id(), &DepId::from("db"));
    assert!(dep.is_required());
    assert!(!dep.has_transform());
    let model: Model = Arc::new(3);
    assert!(Arc::ptr_eq(&dep.apply(model.clone()), &model));
}

#[test]
fn normalization_keeps_descriptors() {
    let dep = Dependency::normalize(Dependency::optional("cache")).unwrap();

    assert_eq!(dep, Dependency::optional("cache"));
}

#[test]
fn invalid_names_are_rejected() {
    assert!(matches!(
        Dependency::normalize(""),
        Err(BrickError::InvalidDependencyKind(_))
    ));
    assert!(matches!(
        Dependency::normalize("two words"),
        Err(BrickError::InvalidDependencyKind(_))
    ));
}

#[test]
fn declared_dependencies_are_read_from_toml() {
    #[derive(serde::Deserialize)]
    struct Declarations {
        deps: Vec<DependencyDecl>,
    }

    let parsed: Declarations = toml::from_str(
        r#"deps = ["db", { id = "cache", required = false }, { id = "queue" }]"#,
    )
    .unwrap();
    let deps = parsed
        .deps
        .into_iter()
        .map(Dependency::normalize)
        .collect::<Result<Vec<_>>>()
        .unwrap();

    assert_eq!(
        deps,
        vec![
            Dependency::new("db"),
            Dependency::optional("cache"),
            Dependency::new("queue")
        ]
    );
}

#[test]
fn module_without_declaration_is_anonymous() {
    let module = Module::value(1);

    assert_eq!(get_inject_info(&module), InjectInfo::default());
    assert_eq!(get_provide_info(&module), ProvideInfo::default());
}

#[test]
fn inject_info_is_stable() {
    let symbol = Symbol::new("logger");
    let module = Module::value(1)
        .named("service", deps!["db", &symbol, Dependency::optional("cache")])
        .unwrap();

    let first = get_inject_info(&module);
    let second = get_inject_info(&module);

    assert_eq!(first, second);
    assert_eq!(first.name, Some(DepId::from("service")));
    assert_eq!(
        first.deps,
        vec![
            Dependency::new("db"),
            Dependency::new(symbol),
            Dependency::optional("cache")
        ]
    );
}

#[test]
fn inject_replaces_previous_declaration() {
    let module = Module::value(1).named("first", deps!["a"]).unwrap();

    inject(
        &module,
        InjectOpts {
            name: None,
            deps: deps!["b"],
        },
    )
    .unwrap();

    let info = get_inject_info(&module);
    assert_eq!(info.name, None);
    assert_eq!(info.deps, vec![Dependency::new("b")]);
}

#[test]
fn invalid_declaration_leaves_module_untouched() {
    let module = Module::value(1).named("kept", deps!["a"]).unwrap();

    let result = inject(
        &module,
        InjectOpts {
            name: Some("other".into()),
            deps: deps!["a", ""],
        },
    );

    assert!(matches!(result, Err(BrickError::InvalidDependencyKind(_))));
    assert_eq!(get_inject_info(&module).name, Some(DepId::from("kept")));
}

#[test]
fn provide_appends_properties_in_order() {
    let module = Module::value(1)
        .provided("db", "database")
        .and_then(|m| m.provided(Dependency::optional("cache"), "cache"))
        .unwrap();

    let info = get_provide_info(&module);

    assert_eq!(info.properties, vec!["database".to_string(), "cache".to_string()]);
    assert_eq!(info.deps, vec![Dependency::new("db"), Dependency::optional("cache")]);
    assert_eq!(get_provide_info(&module), info);
}

#[test]
fn provide_requires_a_property() {
    let module = Module::value(1);

    let result = provide(
        &module,
        ProvideOpts {
            dep: "db".into(),
            property: String::new(),
        },
    );

    assert!(matches!(result, Err(BrickError::InvalidArgument(_))));
}

#[test]
fn clones_share_declarations() {
    let module = Module::value(1).named("shared", deps![]).unwrap();
    let clone = module.clone();

    assert_eq!(clone.id(), module.id());
    assert_eq!(get_inject_info(&clone).name, Some(DepId::from("shared")));
}

#[test]
fn symbol_display_uses_description() {
    let symbol = Symbol::new("token");

    assert_eq!(symbol.description(), "token");
    assert_eq!(DepId::from(&symbol).to_string(), "Symbol(token)");
    assert_ne!(symbol, Symbol::new("token"));
}
