#![allow(dead_code)]

use async_trait::async_trait;
use dirform_session::channel::mock::RecordedCall;
use dirform_session::{
    CallQueue, EventGuard, RemoteChannel, RpcError, SessionConfig, SessionEnv, TemplateCatalog,
};
use dirform_template::{BuilderConfig, TemplateBuilder, WidgetRegistry};
use dirform_types::ObjectId;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};

pub const USER_UUID: &str = "0191e3c6-3c1c-7f00-8000-000000000001";
pub const USER_DN: &str = "uid=jdoe,ou=people,dc=example,dc=net";
pub const OTHER_UUID: &str = "0191e3c6-3c1c-7f00-8000-000000000002";
pub const OTHER_DN: &str = "uid=asmith,ou=people,dc=example,dc=net";

// ── Templates ───────────────────────────────────────────────────

pub const USER_UI: &str = r#"<ui version="4.0">
 <class>User</class>
 <widget class="QWidget" name="User">
  <property name="windowTitle"><string>Generic</string></property>
  <layout class="QGridLayout">
   <item row="0" column="0">
    <widget class="QLabel" name="uidLabel">
     <property name="text"><string>Login</string></property>
     <property name="buddy"><cstring>uidEdit</cstring></property>
    </widget>
   </item>
   <item row="0" column="1"><widget class="QLineEdit" name="uidEdit"/></item>
   <item row="1" column="0">
    <widget class="QLabel" name="cnLabel">
     <property name="text"><string>Common name</string></property>
     <property name="buddy"><cstring>cnEdit</cstring></property>
    </widget>
   </item>
   <item row="1" column="1"><widget class="QLineEdit" name="cnEdit"/></item>
   <item row="2" column="1"><widget class="QLineEdit" name="mailEdit"/></item>
   <item row="3" column="1"><widget class="QLineEdit" name="typeEdit"/></item>
   <item row="4" column="1">
    <widget class="QLineEdit" name="secretaryEdit">
     <property name="blockedBy"><string>[{"name": "type", "value": "X"}]</string></property>
    </widget>
   </item>
  </layout>
  <action name="lockAccount">
   <property name="text"><string>Lock</string></property>
   <property name="condition"><string>!is_locked(dn, 'user')</string></property>
  </action>
  <action name="sendMail">
   <property name="condition"><string>mail</string></property>
  </action>
 </widget>
 <connections>
  <connection><sender>uidEdit</sender><signal>textChanged()</signal><receiver>User</receiver><slot>uid</slot></connection>
  <connection><sender>cnEdit</sender><signal>textChanged()</signal><receiver>User</receiver><slot>cn</slot></connection>
  <connection><sender>mailEdit</sender><signal>textChanged()</signal><receiver>User</receiver><slot>mail</slot></connection>
  <connection><sender>typeEdit</sender><signal>textChanged()</signal><receiver>User</receiver><slot>type</slot></connection>
  <connection><sender>secretaryEdit</sender><signal>textChanged()</signal><receiver>User</receiver><slot>secretary</slot></connection>
 </connections>
</ui>"#;

fn extension_ui(class: &str, widget: &str, attribute: &str) -> String {
    format!(
        r#"<ui version="4.0">
 <class>{class}</class>
 <widget class="QWidget" name="{class}">
  <layout class="QVBoxLayout">
   <item><widget class="QSpinBox" name="{widget}"/></item>
  </layout>
 </widget>
 <connections>
  <connection><sender>{widget}</sender><signal>valueChanged()</signal><receiver>{class}</receiver><slot>{attribute}</slot></connection>
 </connections>
</ui>"#
    )
}

pub fn catalog() -> TemplateCatalog {
    TemplateCatalog::new()
        .with("User", USER_UI)
        .with("PosixUser", extension_ui("PosixUser", "uidNumberEdit", "uidNumber"))
        .with("ShadowUser", extension_ui("ShadowUser", "shadowMaxEdit", "shadowMax"))
        .with("SambaUser", extension_ui("SambaUser", "sambaPwdEdit", "sambaPwdLastSet"))
}

// ── Object state ────────────────────────────────────────────────

/// `SambaUser` requires `PosixUser` and `ShadowUser`; `MailAccount` has no
/// template.
pub fn user_state() -> Value {
    json!({
        "uuid": USER_UUID,
        "dn": USER_DN,
        "base_type": "User",
        "extensions": {
            "PosixUser": false,
            "ShadowUser": false,
            "SambaUser": false,
            "MailAccount": false
        },
        "extension_deps": {
            "PosixUser": [],
            "ShadowUser": [],
            "SambaUser": ["PosixUser", "ShadowUser"],
            "MailAccount": []
        },
        "attributes": {
            "uid": ["jdoe"],
            "cn": ["John Doe"],
            "type": ["Y"]
        },
        "descriptors": {
            "uid": {"mandatory": true},
            "cn": {"mandatory": true},
            "mail": {"mandatory": true},
            "type": {},
            "secretary": {"mandatory": true},
            "uidNumber": {"type": "Integer", "mandatory": true},
            "shadowMax": {"type": "Integer"},
            "sambaPwdLastSet": {"type": "Integer"}
        }
    })
}

pub fn other_state() -> Value {
    let mut state = user_state();
    state["uuid"] = json!(OTHER_UUID);
    state["dn"] = json!(OTHER_DN);
    state["attributes"]["uid"] = json!(["asmith"]);
    state
}

pub fn user_id() -> ObjectId {
    ObjectId::parse(USER_UUID).unwrap()
}

pub fn other_id() -> ObjectId {
    ObjectId::parse(OTHER_UUID).unwrap()
}

// ── Fake backend ────────────────────────────────────────────────

/// A stateful stand-in for the directory backend.
///
/// Holds object states keyed by uuid, applies attribute updates and
/// extend/retract calls to them, answers `diffObject` from a scripted queue
/// and records every call.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    objects: Mutex<HashMap<String, Value>>,
    diffs: Mutex<VecDeque<Value>>,
    failures: Mutex<HashMap<String, VecDeque<RpcError>>>,
    answers: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeDirectory {
    pub fn with_objects(states: Vec<Value>) -> Arc<Self> {
        let fake = Self::default();
        {
            let mut objects = fake.objects.lock().unwrap();
            for state in states {
                let uuid = state["uuid"].as_str().unwrap().to_string();
                objects.insert(uuid, state);
            }
        }
        Arc::new(fake)
    }

    pub fn new() -> Arc<Self> {
        Self::with_objects(vec![user_state()])
    }

    /// Queues the answer of the next `diffObject` call.
    pub fn push_diff(&self, diff: Value) {
        self.diffs.lock().unwrap().push_back(diff);
    }

    /// Fails the next call to `key`, where key is a method name or
    /// `dispatchObjectMethod:<verb>[:<extension>]`.
    pub fn fail_next(&self, key: &str, error: RpcError) {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Answer for calls to a condition method.
    pub fn answer(&self, method: &str, value: Value) {
        self.answers.lock().unwrap().insert(method.to_string(), value);
    }

    /// Changes the stored state as another client would.
    pub fn backend_edit(&self, uuid: &str, edit: impl FnOnce(&mut Value)) {
        let mut objects = self.objects.lock().unwrap();
        edit(objects.get_mut(uuid).unwrap());
    }

    pub fn state(&self, uuid: &str) -> Value {
        self.objects.lock().unwrap()[uuid].clone()
    }

    pub fn active_extensions(&self, uuid: &str) -> Vec<String> {
        let state = self.state(uuid);
        state["extensions"]
            .as_object()
            .unwrap()
            .iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .map(|c| c.args)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn take_failure(&self, key: &str) -> Option<RpcError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
    }

    fn handle(&self, method: &str, args: &[Value]) -> Result<Value, RpcError> {
        let arg = |i: usize| args.get(i).and_then(Value::as_str).unwrap_or_default().to_string();
        let mut objects = self.objects.lock().unwrap();
        match method {
            "openObject" => objects
                .values()
                .find(|s| s["dn"] == json!(arg(1)))
                .cloned()
                .ok_or_else(|| RpcError::new("NO_SUCH_OBJECT", arg(1))),
            "reloadObject" => objects
                .get(&arg(0))
                .cloned()
                .ok_or_else(|| RpcError::new("NO_SUCH_OBJECT", arg(0))),
            "setObjectProperty" => {
                let state = objects
                    .get_mut(&arg(0))
                    .ok_or_else(|| RpcError::new("NO_SUCH_OBJECT", arg(0)))?;
                state["attributes"][arg(1)] = args.get(2).cloned().unwrap_or(Value::Null);
                Ok(Value::Null)
            }
            "dispatchObjectMethod" => {
                let state = objects
                    .get_mut(&arg(0))
                    .ok_or_else(|| RpcError::new("NO_SUCH_OBJECT", arg(0)))?;
                match arg(1).as_str() {
                    "extend" => state["extensions"][arg(2)] = json!(true),
                    "retract" => state["extensions"][arg(2)] = json!(false),
                    _ => {}
                }
                Ok(Value::Null)
            }
            "diffObject" => Ok(self.diffs.lock().unwrap().pop_front().unwrap_or(Value::Null)),
            "closeObject" | "removeObject" => Ok(Value::Null),
            other => Ok(self
                .answers
                .lock()
                .unwrap()
                .get(other)
                .cloned()
                .unwrap_or(Value::Null)),
        }
    }
}

#[async_trait]
impl RemoteChannel for FakeDirectory {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            args: args.clone(),
        });
        let verb = args.get(1).and_then(Value::as_str).unwrap_or_default();
        let ext = args.get(2).and_then(Value::as_str).unwrap_or_default();
        let keys = [
            format!("{}:{}:{}", method, verb, ext),
            format!("{}:{}", method, verb),
            method.to_string(),
        ];
        for key in &keys {
            if let Some(error) = self.take_failure(key) {
                return Err(error);
            }
        }
        self.handle(method, &args)
    }
}

// ── Session setup ───────────────────────────────────────────────

// ── Guard watcher ───────────────────────────────────────────────

/// Wraps the fake directory and notes, for every call, whether a watched
/// event guard was held while the call ran.
pub struct GuardWatcher {
    inner: Arc<FakeDirectory>,
    guard: OnceLock<EventGuard>,
    stalled: Mutex<Option<String>>,
    seen: Mutex<Vec<(String, bool)>>,
}

impl GuardWatcher {
    pub fn new(inner: Arc<FakeDirectory>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            guard: OnceLock::new(),
            stalled: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn watch(&self, guard: EventGuard) {
        let _ = self.guard.set(guard);
    }

    /// Calls to `method` never complete.
    pub fn stall(&self, method: &str) {
        *self.stalled.lock().unwrap() = Some(method.to_string());
    }

    pub fn seen(&self) -> Vec<(String, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteChannel for GuardWatcher {
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let held = self.guard.get().is_some_and(EventGuard::is_suppressing);
        self.seen.lock().unwrap().push((method.to_string(), held));
        let stalled = self.stalled.lock().unwrap().as_deref() == Some(method);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.inner.call(method, args).await
    }
}

pub fn make_env(backend: Arc<FakeDirectory>) -> SessionEnv {
    SessionEnv {
        queue: Arc::new(CallQueue::new(backend)),
        templates: Arc::new(catalog()),
        builder: Arc::new(TemplateBuilder::new(
            WidgetRegistry::standard(),
            BuilderConfig::default(),
        )),
        config: SessionConfig::default(),
    }
}

pub fn widget_value(session: &dirform_session::EditSession, context: &str, widget: &str) -> Vec<Value> {
    session
        .context(context)
        .unwrap()
        .widget(widget)
        .unwrap()
        .value()
        .to_vec()
}
