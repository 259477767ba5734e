use std::sync::Mutex;

use super::*;

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

/// Model accepting a single `label` property
#[derive(Default)]
struct Labelled {
    label: Mutex<Option<String>>,
}

impl Slots for Labelled {
    fn assign(&self, property: &str, value: Resolved) -> Result<(), BoxError> {
        if property != "label" {
            return Err(format!("unknown property {property}").into());
        }
        let label = match value {
            Some(model) => Some(
                model
                    .downcast::<String>()
                    .map_err(|_| "label must be a string")?
                    .to_string(),
            ),
            None => None,
        };
        *self.label.lock().unwrap() = label;
        Ok(())
    }
}

fn built(module: Module) -> Built {
    let model = build_model(module.factory(), Args::default()).unwrap();
    Built {
        name: None,
        module,
        model,
    }
}

#[test]
fn constructor_builds_a_new_instance_per_call() {
    let factory = Factory::constructor(|args: &Args| {
        Ok(Point {
            x: *args.get::<i32>(0)?,
            y: *args.get::<i32>(1)?,
        })
    });
    let args = || Args::new(vec![Some(Arc::new(1) as Model), Some(Arc::new(2) as Model)]);

    let first = build_model(&factory, args()).unwrap();
    let second = build_model(&factory, args()).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
}

#[test]
fn function_returns_its_result() {
    let shared: Model = Arc::new(Point { x: 0, y: 0 });
    let returned = shared.clone();
    let factory = Factory::function(move |_| Ok(returned.clone()));

    let model = build_model(&factory, Args::default()).unwrap();

    assert!(Arc::ptr_eq(&model, &shared));
}

#[test]
fn value_is_returned_unchanged() {
    let factory = Factory::value(Point { x: 3, y: 4 });
    let Factory::Value(original) = &factory else {
        panic!("expected a value factory");
    };

    let model = build_model(&factory, Args::new(vec![Some(Arc::new(9) as Model)])).unwrap();

    assert!(Arc::ptr_eq(&model, original));
    assert!(!factory.is_callable());
}

#[test]
fn factory_failure_is_wrapped() {
    let factory = Factory::constructor(|args: &Args| args.get::<Point>(0).map_err(BoxError::from));

    let result = build_model(&factory, Args::default());

    assert!(matches!(
        result,
        Err(BrickError::ConstructionFailure { name: None, .. })
    ));
}

#[test]
fn typed_arguments() {
    let args = Args::new(vec![Some(Arc::new(1) as Model), None]);

    assert_eq!(args.len(), 2);
    assert_eq!(*args.get::<i32>(0).unwrap(), 1);
    assert!(args.optional::<i32>(1).unwrap().is_none());
    assert!(args.get::<i32>(1).is_err());
    assert!(args.get::<String>(0).is_err());
    assert!(args.model(5).is_none());
    assert!(args.engine().is_none());
}

#[test]
fn init_model_assigns_transformed_values() {
    let module = Module::constructor(|_: &Args| Ok(Labelled::default())).with_slots::<Labelled>();
    let upper = Dependency::new("name").with_transform(|model| {
        let name = model.downcast::<String>().map(|s| s.to_uppercase()).unwrap_or_default();
        Arc::new(name) as Model
    });

    let target = init_model(
        built(module),
        &["label".to_string()],
        &[upper],
        vec![Some(Arc::new("brick".to_string()) as Model)],
    )
    .unwrap();

    let labelled = target.model.downcast_ref::<Labelled>().unwrap();
    assert_eq!(labelled.label.lock().unwrap().as_deref(), Some("BRICK"));
}

#[test]
fn init_model_without_properties_is_a_no_op() {
    let target = built(Module::value(5));
    let model = target.model.clone();

    let target = init_model(target, &[], &[], vec![]).unwrap();

    assert!(Arc::ptr_eq(&target.model, &model));
}

#[test]
fn init_model_follows_declaration_order() {
    let module = Module::constructor(|_: &Args| Ok(PropertyBag::new())).with_slots::<PropertyBag>();

    let target = init_model(
        built(module),
        &["a".to_string(), "a".to_string(), "b".to_string()],
        &[dep("x"), dep("y"), dep("z")],
        vec![
            Some(Arc::new(1) as Model),
            Some(Arc::new(2) as Model),
            Some(Arc::new(3) as Model),
        ],
    )
    .unwrap();

    let bag = target.model.downcast_ref::<PropertyBag>().unwrap();
    assert_eq!(bag.properties(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(bag.get::<i32>("a").as_deref(), Some(&2));
    assert_eq!(bag.get::<i32>("b").as_deref(), Some(&3));
}

#[test]
fn init_model_requires_slots() {
    let target = built(Module::value(5));

    let result = init_model(target, &["x".to_string()], &[dep("x")], vec![None]);

    assert!(matches!(result, Err(BrickError::InvalidArgument(_))));
}

#[test]
fn init_model_rejects_mismatched_lengths() {
    let module = Module::constructor(|_: &Args| Ok(PropertyBag::new())).with_slots::<PropertyBag>();

    let result = init_model(built(module), &["x".to_string()], &[], vec![]);

    assert!(matches!(result, Err(BrickError::InvalidArgument(_))));
}

#[test]
fn slot_failure_is_a_construction_failure() {
    let module = Module::constructor(|_: &Args| Ok(Labelled::default())).with_slots::<Labelled>();

    let result = init_model(
        built(module),
        &["color".to_string()],
        &[dep("color")],
        vec![None],
    );

    assert!(matches!(result, Err(BrickError::ConstructionFailure { .. })));
}

#[test]
fn property_bag_removes_absent_values() {
    let bag = PropertyBag::new();

    bag.assign("cache", Some(Arc::new(1) as Model)).unwrap();
    assert!(bag.contains("cache"));
    bag.assign("cache", None).unwrap();

    assert!(!bag.contains("cache"));
    assert!(bag.get::<i32>("cache").is_none());
}
