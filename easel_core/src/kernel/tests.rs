use super::*;
use crate::scene::{MemoryScene, PointerButton};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

struct TestCapability {
    name: String,
    events: Vec<String>,
    hotkeys: Vec<String>,
    hook_points: Vec<HookPoint>,
    fail_hook: bool,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Capability for TestCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> Vec<String> {
        self.events.clone()
    }

    fn hotkeys(&self) -> Vec<String> {
        self.hotkeys.clone()
    }

    fn hook_points(&self) -> Vec<HookPoint> {
        self.hook_points.clone()
    }

    async fn on_hook(&self, point: HookPoint, payload: Value) -> Result<Value> {
        if self.fail_hook {
            return Err(EditorError::Runtime(format!(
                "{} refused {}",
                self.name, point
            )));
        }
        self.recorder.push(format!("{}:{}", self.name, point));
        Ok(payload)
    }

    async fn mounted(&self) -> Result<()> {
        self.recorder.push(format!("{}:mounted", self.name));
        Ok(())
    }

    async fn destroyed(&self) -> Result<()> {
        self.recorder.push(format!("{}:destroyed", self.name));
        Ok(())
    }

    fn hotkey_event(&self, hotkey: &Hotkey, event: &KeyEvent) {
        if event.phase == KeyPhase::Down {
            self.recorder.push(format!("{}:{}", self.name, hotkey));
        }
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct Fixture<'a> {
    name: &'a str,
    events: &'a [&'a str],
    hotkeys: &'a [&'a str],
    hook_points: &'a [HookPoint],
    fail_hook: bool,
}

impl<'a> Fixture<'a> {
    fn named(name: &'a str) -> Self {
        Self {
            name,
            events: &[],
            hotkeys: &[],
            hook_points: &[],
            fail_hook: false,
        }
    }
}

fn descriptor(recorder: &Arc<Recorder>, fixture: Fixture<'_>) -> CapabilityDescriptor {
    let capability = TestCapability {
        name: fixture.name.to_string(),
        events: fixture.events.iter().map(|s| s.to_string()).collect(),
        hotkeys: fixture.hotkeys.iter().map(|s| s.to_string()).collect(),
        hook_points: fixture.hook_points.to_vec(),
        fail_hook: fixture.fail_hook,
        recorder: recorder.clone(),
    };
    CapabilityDescriptor::new(Value::Null, move |_, _, _| Ok(capability))
}

fn setup() -> (Editor, Arc<MemoryScene>, Arc<Recorder>) {
    let _ = tracing_subscriber::fmt::try_init();
    let editor = Editor::new();
    let scene = Arc::new(MemoryScene::new());
    editor.init(scene.clone());
    (editor, scene, Arc::new(Recorder::default()))
}

#[tokio::test]
async fn test_register_before_init_is_rejected() {
    let editor = Editor::new();
    let recorder = Arc::new(Recorder::default());
    let result = editor.register(vec![descriptor(&recorder, Fixture::named("alpha"))]);
    assert!(matches!(result, Err(EditorError::NotInitialized)));
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let (editor, _scene, recorder) = setup();

    editor
        .register(vec![descriptor(&recorder, Fixture::named("alpha"))])
        .unwrap();
    let result = editor.register(vec![descriptor(&recorder, Fixture::named("alpha"))]);

    assert!(matches!(result, Err(EditorError::DuplicateCapability(_))));
    // The first instance is untouched.
    assert_eq!(editor.capability_names(), vec!["alpha"]);
    assert!(editor.lookup("alpha").is_some());
}

#[tokio::test]
async fn test_duplicate_event_name_is_rejected() {
    let (editor, _scene, recorder) = setup();

    editor
        .register(vec![descriptor(
            &recorder,
            Fixture {
                events: &["selection-changed"],
                ..Fixture::named("alpha")
            },
        )])
        .unwrap();

    let result = editor.register(vec![descriptor(
        &recorder,
        Fixture {
            events: &["object-moved", "selection-changed"],
            ..Fixture::named("beta")
        },
    )]);

    assert!(matches!(result, Err(EditorError::DuplicateEvent { .. })));
    assert_eq!(editor.capability_names(), vec!["alpha"]);
    assert_eq!(editor.custom_events(), vec!["selection-changed"]);
}

#[tokio::test]
async fn test_failed_registration_is_all_or_nothing() {
    let (editor, _scene, recorder) = setup();

    editor
        .register(vec![descriptor(
            &recorder,
            Fixture {
                events: &["taken"],
                ..Fixture::named("alpha")
            },
        )])
        .unwrap();

    // beta collides on an event name after declaring hotkeys and hooks.
    let result = editor.register(vec![descriptor(
        &recorder,
        Fixture {
            events: &["fresh", "taken"],
            hotkeys: &["ctrl+b"],
            hook_points: &[HookPoint::ImportBefore],
            ..Fixture::named("beta")
        },
    )]);
    assert!(result.is_err());

    assert!(editor.lookup("beta").is_none());
    assert!(editor.hotkeys_of("beta").is_empty());
    assert!(editor.hook_owners(HookPoint::ImportBefore).is_empty());
    assert!(!editor.custom_events().contains(&"fresh".to_string()));

    // An unparsable hotkey is caught by validation with the same guarantee.
    let result = editor.register(vec![descriptor(
        &recorder,
        Fixture {
            hotkeys: &["ctrl+"],
            hook_points: &[HookPoint::SaveBefore],
            ..Fixture::named("gamma")
        },
    )]);
    assert!(matches!(result, Err(EditorError::InvalidHotkey(_))));
    assert!(editor.lookup("gamma").is_none());
    assert!(editor.hook_owners(HookPoint::SaveBefore).is_empty());
}

#[tokio::test]
async fn test_hook_chain_runs_in_registration_order() {
    let (editor, _scene, recorder) = setup();

    for name in ["alpha", "beta", "gamma"] {
        editor
            .register(vec![descriptor(
                &recorder,
                Fixture {
                    hook_points: &[HookPoint::ImportBefore],
                    ..Fixture::named(name)
                },
            )])
            .unwrap();
    }
    for name in ["alpha", "beta", "gamma"] {
        editor
            .await_mounted(name, Some(Duration::from_secs(1)))
            .await
            .unwrap();
    }
    recorder.log.lock().unwrap().clear();

    let payload = editor
        .run_hook(HookPoint::ImportBefore, json!({ "doc": 1 }))
        .await
        .unwrap();
    assert_eq!(payload, json!({ "doc": 1 }));
    assert_eq!(
        recorder.entries(),
        vec![
            "alpha:import:before",
            "beta:import:before",
            "gamma:import:before"
        ]
    );
}

#[tokio::test]
async fn test_failing_hook_aborts_the_chain() {
    let (editor, _scene, recorder) = setup();

    editor
        .register(vec![
            descriptor(
                &recorder,
                Fixture {
                    hook_points: &[HookPoint::ImportBefore],
                    ..Fixture::named("alpha")
                },
            ),
            descriptor(
                &recorder,
                Fixture {
                    hook_points: &[HookPoint::ImportBefore],
                    fail_hook: true,
                    ..Fixture::named("beta")
                },
            ),
            descriptor(
                &recorder,
                Fixture {
                    hook_points: &[HookPoint::ImportBefore],
                    ..Fixture::named("gamma")
                },
            ),
        ])
        .unwrap();
    for name in ["alpha", "beta", "gamma"] {
        editor
            .await_mounted(name, Some(Duration::from_secs(1)))
            .await
            .unwrap();
    }
    recorder.log.lock().unwrap().clear();

    let result = editor.run_hook(HookPoint::ImportBefore, Value::Null).await;
    match result {
        Err(EditorError::HookFailed {
            point, capability, ..
        }) => {
            assert_eq!(point, HookPoint::ImportBefore);
            assert_eq!(capability, "beta");
        }
        other => panic!("expected hook failure, got {:?}", other),
    }
    // gamma never ran.
    assert_eq!(recorder.entries(), vec!["alpha:import:before"]);
}

#[tokio::test]
async fn test_await_mounted_resolves_pending_lookup() {
    let (editor, _scene, recorder) = setup();

    let waiter = {
        let editor = editor.clone();
        tokio::spawn(async move {
            editor
                .await_mounted("alpha", Some(Duration::from_secs(1)))
                .await
        })
    };
    tokio::task::yield_now().await;

    editor
        .register(vec![descriptor(&recorder, Fixture::named("alpha"))])
        .unwrap();

    let capability = waiter.await.unwrap().unwrap();
    assert_eq!(capability.name(), "alpha");

    // Already mounted: resolves immediately, no new mount event needed.
    let capability = editor
        .await_mounted("alpha", Some(Duration::from_millis(10)))
        .await
        .unwrap();
    assert_eq!(capability.name(), "alpha");
}

#[tokio::test]
async fn test_mounted_announcement_on_bus() {
    let (editor, _scene, recorder) = setup();
    let mut events = editor.subscribe();

    editor
        .register(vec![descriptor(&recorder, Fixture::named("alpha"))])
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), async move {
        loop {
            let event = events.recv().await.unwrap();
            if event.name == "alpha:mounted" {
                return event;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(event.name, "alpha:mounted");
}

#[tokio::test]
async fn test_hotkey_fan_out_in_registration_order() {
    let (editor, _scene, recorder) = setup();

    for name in ["alpha", "beta"] {
        editor
            .register(vec![descriptor(
                &recorder,
                Fixture {
                    hotkeys: &["ctrl+z"],
                    ..Fixture::named(name)
                },
            )])
            .unwrap();
    }
    recorder.log.lock().unwrap().clear();

    let hotkey: Hotkey = "ctrl+z".parse().unwrap();
    let invoked = editor.dispatch_key(&KeyEvent::down(&hotkey));
    assert_eq!(invoked, 2);
    assert_eq!(recorder.entries(), vec!["alpha:ctrl+z", "beta:ctrl+z"]);
}

#[tokio::test]
async fn test_teardown_clears_everything() {
    let (editor, _scene, recorder) = setup();

    editor
        .register(vec![
            descriptor(
                &recorder,
                Fixture {
                    events: &["alpha-event"],
                    hotkeys: &["ctrl+z"],
                    hook_points: &[HookPoint::SaveBefore],
                    ..Fixture::named("alpha")
                },
            ),
            descriptor(
                &recorder,
                Fixture {
                    hotkeys: &["ctrl+z"],
                    ..Fixture::named("beta")
                },
            ),
        ])
        .unwrap();

    for name in ["alpha", "beta"] {
        editor
            .await_mounted(name, Some(Duration::from_secs(1)))
            .await
            .unwrap();
    }
    recorder.log.lock().unwrap().clear();

    editor.teardown().await;

    // Capabilities were destroyed in registration order.
    assert_eq!(recorder.entries(), vec!["alpha:destroyed", "beta:destroyed"]);
    assert!(editor.capability_names().is_empty());
    assert!(editor.custom_events().is_empty());
    for point in HookPoint::ALL {
        assert!(editor.hook_owners(point).is_empty());
    }

    let hotkey: Hotkey = "ctrl+z".parse().unwrap();
    assert_eq!(editor.dispatch_key(&KeyEvent::down(&hotkey)), 0);
}

#[tokio::test]
async fn test_ready_event_flips_status() {
    let (editor, _scene, _recorder) = setup();
    assert!(!editor.status().ready);

    editor.emit(READY_EVENT, Value::Null);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !editor.status().ready {
        assert!(
            tokio::time::Instant::now() < deadline,
            "status never became ready"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_later_capability_can_look_up_earlier_one() {
    let (editor, _scene, recorder) = setup();
    editor
        .register(vec![descriptor(&recorder, Fixture::named("alpha"))])
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let seen_in_build = seen.clone();
    let beta = CapabilityDescriptor::new(Value::Null, move |_, editor, _| {
        *seen_in_build.lock().unwrap() = Some(editor.lookup("alpha").is_some());
        Ok(TestCapability {
            name: "beta".to_string(),
            events: Vec::new(),
            hotkeys: Vec::new(),
            hook_points: Vec::new(),
            fail_hook: false,
            recorder: Arc::new(Recorder::default()),
        })
    });
    editor.register(vec![beta]).unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn test_context_menu_routing_reaches_role_owner() {
    struct Menu {
        shown: Mutex<Vec<(f64, f64)>>,
    }

    #[async_trait]
    impl Capability for Menu {
        fn name(&self) -> &str {
            "menu"
        }

        fn as_context_menu(&self) -> Option<&dyn ContextMenuHandler> {
            Some(self)
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl ContextMenuHandler for Menu {
        fn show_menu(&self, x: f64, y: f64) {
            self.shown.lock().unwrap().push((x, y));
        }

        fn hide_menu(&self) {}
    }

    let (editor, scene, _recorder) = setup();
    editor
        .register(vec![CapabilityDescriptor::new(Value::Null, |_, _, _| {
            Ok(Menu {
                shown: Mutex::new(Vec::new()),
            })
        })])
        .unwrap();
    editor
        .await_mounted("menu", Some(Duration::from_secs(1)))
        .await
        .unwrap();

    scene.pointer_down(PointerButton::Secondary, 12.0, 34.0);
    // A primary click must not open the menu.
    scene.pointer_down(PointerButton::Primary, 1.0, 1.0);

    let menu = editor.lookup_as::<Menu>("menu").unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let shown = menu.shown.lock().unwrap().clone();
        if shown == vec![(12.0, 34.0)] {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "context menu was never shown"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_mount_failure_marks_capability_failed() {
    struct FailingMount;

    #[async_trait]
    impl Capability for FailingMount {
        fn name(&self) -> &str {
            "failing"
        }

        async fn mounted(&self) -> Result<()> {
            Err(EditorError::Runtime("mount exploded".to_string()))
        }

        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    let (editor, _scene, _recorder) = setup();
    editor
        .register(vec![CapabilityDescriptor::new(Value::Null, |_, _, _| {
            Ok(FailingMount)
        })])
        .unwrap();

    let result = editor
        .await_mounted("failing", Some(Duration::from_millis(100)))
        .await;
    assert!(matches!(result, Err(EditorError::LookupTimeout(_))));
    assert!(matches!(
        editor.capability_state("failing"),
        Some(CapabilityState::Failed(_))
    ));
}
