use dirform_model::BlockRule;
use dirform_template::{
    BuilderConfig, Context, FormRole, LayoutKind, Placement, Rect, TemplateBuilder, TemplateError,
    WidgetFlags, WidgetKind, WidgetRegistry,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Fixtures ────────────────────────────────────────────────────

const USER_FORM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ui version="4.0">
 <class>User</class>
 <widget class="QWidget" name="User">
  <property name="windowTitle"><string>Generic user</string></property>
  <property name="windowIcon"><iconset><normaloff>:/icons/user.png</normaloff></iconset></property>
  <layout class="QGridLayout" name="grid">
   <item row="0" column="0">
    <widget class="QLabel" name="uidLabel">
     <property name="text"><string>&amp;Login:</string></property>
     <property name="buddy"><cstring>uidEdit</cstring></property>
    </widget>
   </item>
   <item row="0" column="1">
    <widget class="QLineEdit" name="uidEdit"/>
   </item>
   <item row="1" column="0">
    <widget class="QLabel" name="mailLabel">
     <property name="text"><string>Mail</string></property>
     <property name="buddy"><cstring>mailEdit</cstring></property>
    </widget>
   </item>
   <item row="1" column="1">
    <widget class="QLineEdit" name="mailEdit">
     <property name="blockedBy"><string>[{"name": "noMail", "value": "true"}]</string></property>
    </widget>
   </item>
   <item row="2" column="0" colspan="2">
    <widget class="QFancyDial" name="dial">
     <widget class="QLineEdit" name="hiddenInside"/>
    </widget>
   </item>
   <item row="3" column="0" colspan="2">
    <widget class="QCheckBox" name="noMailCheck">
     <property name="text"><string>No mail</string></property>
    </widget>
   </item>
  </layout>
  <action name="lockAccount">
   <property name="text"><string>Lock account</string></property>
   <property name="icon"><iconset><normaloff>:/icons/lock.png</normaloff></iconset></property>
   <property name="condition"><string>!is_locked(dn)</string></property>
  </action>
 </widget>
 <tabstops>
  <tabstop>uidEdit</tabstop>
  <tabstop>ghost</tabstop>
  <tabstop>mailEdit</tabstop>
 </tabstops>
 <resources>
  <include location="user.qrc"/>
 </resources>
 <connections>
  <connection>
   <sender>uidEdit</sender><signal>textChanged()</signal>
   <receiver>User</receiver><slot>uid</slot>
  </connection>
  <connection>
   <sender>mailEdit</sender><signal>textChanged()</signal>
   <receiver>User</receiver><slot>mail()</slot>
  </connection>
  <connection>
   <sender>noMailCheck</sender><signal>toggled()</signal>
   <receiver>User</receiver><slot>noMail</slot>
  </connection>
  <connection>
   <sender>hiddenInside</sender><signal>textChanged()</signal>
   <receiver>User</receiver><slot>gecos</slot>
  </connection>
 </connections>
</ui>"#;

fn builder() -> TemplateBuilder {
    TemplateBuilder::new(WidgetRegistry::standard(), BuilderConfig::default())
}

fn wrap(body: &str) -> String {
    format!(r#"<ui version="4.0"><class>T</class>{}</ui>"#, body)
}

// ── Grid form ───────────────────────────────────────────────────

#[test]
fn grid_form_places_widgets_and_binds_attributes() {
    let built = builder().build(USER_FORM).unwrap();
    assert_eq!(built.class_name, "User");

    let root = built.widget().unwrap();
    assert_eq!(root.name, "User");
    assert_eq!(root.layout, Some(LayoutKind::Grid));

    let uid = built.tree.by_name("uidEdit").unwrap();
    assert_eq!(uid.kind, WidgetKind::LineEdit);
    assert_eq!(
        uid.placement,
        Placement::Grid {
            row: 0,
            column: 1,
            rowspan: 1,
            colspan: 1
        }
    );

    assert_eq!(built.bindings.widget_for("uid"), Some("uidEdit"));
    assert_eq!(built.bindings.widget_for("mail"), Some("mailEdit"));
    assert_eq!(built.bindings.attribute_for("noMailCheck"), Some("noMail"));
}

#[test]
fn unknown_class_skips_subtree_only() {
    let built = builder().build(USER_FORM).unwrap();
    assert!(built.tree.by_name("dial").is_none());
    assert!(built.tree.by_name("hiddenInside").is_none());
    // Siblings after the unknown widget still render.
    assert!(built.tree.by_name("noMailCheck").is_some());
    // The connection from the skipped widget is dropped.
    assert_eq!(built.bindings.widget_for("gecos"), None);
    assert_eq!(built.bindings.len(), 3);
}

#[test]
fn buddy_labels_are_linked() {
    let built = builder().build(USER_FORM).unwrap();
    let uid = built.tree.by_name("uidEdit").unwrap();
    assert_eq!(uid.label.as_deref(), Some("Login"));
    let label = built.tree.by_name("uidLabel").unwrap();
    assert_eq!(label.buddy_of.as_deref(), Some("uidEdit"));
    assert_eq!(built.buddies.get("mailEdit").map(String::as_str), Some("mailLabel"));
}

#[test]
fn blocked_by_property_becomes_rules() {
    let built = builder().build(USER_FORM).unwrap();
    let mail = built.tree.by_name("mailEdit").unwrap();
    assert_eq!(mail.block_rules, vec![BlockRule::new("noMail", "true")]);
}

#[test]
fn tabstops_resources_and_commands() {
    let built = builder().build(USER_FORM).unwrap();
    assert_eq!(built.tabstops, vec!["uidEdit".to_string(), "mailEdit".to_string()]);
    assert_eq!(built.resources, vec!["user.qrc".to_string()]);

    assert_eq!(built.commands.len(), 1);
    let lock = &built.commands[0];
    assert_eq!(lock.name, "lockAccount");
    assert_eq!(lock.text.as_deref(), Some("Lock account"));
    assert_eq!(lock.icon.as_deref(), Some(":/icons/lock.png"));
    let condition = lock.condition.as_ref().unwrap();
    assert!(condition.negate);
    assert!(condition.is_remote());
    assert!(!lock.evaluated);
}

#[test]
fn walk_visits_root_first_in_document_order() {
    let built = builder().build(USER_FORM).unwrap();
    let names: Vec<&str> = built
        .tree
        .walk()
        .into_iter()
        .map(|id| built.tree.get(id).unwrap().name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["User", "uidLabel", "uidEdit", "mailLabel", "mailEdit", "noMailCheck"]
    );
}

#[test]
fn password_echo_line_edit_becomes_password_field() {
    let built = builder()
        .build(&wrap(
            r#"<widget class="QWidget" name="T">
             <layout class="QVBoxLayout">
              <item><widget class="QLineEdit" name="pwEdit">
               <property name="echoMode"><enum>QLineEdit::Password</enum></property>
              </widget></item>
              <item><widget class="QLineEdit" name="plainEdit">
               <property name="echoMode"><enum>QLineEdit::Normal</enum></property>
              </widget></item>
             </layout>
            </widget>"#,
        ))
        .unwrap();

    let pw = built.tree.by_name("pwEdit").unwrap();
    assert_eq!(pw.kind, WidgetKind::PasswordEdit);
    assert_eq!(pw.class, "QLineEdit");
    assert_eq!(pw.merge_widget(&[json!("secret")]).display, "••••••");
    assert_eq!(built.tree.by_name("plainEdit").unwrap().kind, WidgetKind::LineEdit);
}

// ── Failure policy ──────────────────────────────────────────────

#[test]
fn version_mismatch_fails() {
    let xml = r#"<ui version="3.3"><widget class="QWidget" name="w"/></ui>"#;
    match builder().build(xml) {
        Err(TemplateError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, "4.0");
            assert_eq!(found, "3.3");
        }
        other => panic!("expected version mismatch, got {:?}", other),
    }
}

#[test]
fn configured_version_is_honored() {
    let config = BuilderConfig {
        ui_version: "3.3".into(),
        ..BuilderConfig::default()
    };
    let builder = TemplateBuilder::new(WidgetRegistry::standard(), config);
    let xml = r#"<ui version="3.3"><widget class="QWidget" name="w"/></ui>"#;
    assert!(builder.build(xml).is_ok());
}

#[test]
fn non_descriptor_and_missing_root_fail() {
    assert!(matches!(
        builder().build("<html/>"),
        Err(TemplateError::NotADescriptor(_))
    ));
    assert!(matches!(
        builder().build(r#"<ui version="4.0"><class>T</class></ui>"#),
        Err(TemplateError::MissingRootWidget)
    ));
    assert!(matches!(builder().build("<ui"), Err(TemplateError::Xml(_))));
}

#[test]
fn unknown_layout_keeps_owner() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <layout class="QMagicLayout"><item><widget class="QLineEdit" name="a"/></item></layout>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    let root = built.widget().unwrap();
    assert_eq!(root.name, "root");
    assert!(root.layout.is_none());
    assert!(root.children.is_empty());
}

#[test]
fn malformed_blocked_by_is_ignored() {
    let xml = wrap(
        r#"<widget class="QLineEdit" name="a">
             <property name="blockedBy"><string>not json</string></property>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    assert!(built.widget().unwrap().block_rules.is_empty());
}

// ── Layout strategies ───────────────────────────────────────────

#[test]
fn canvas_fallback_for_multiple_children_without_layout() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <widget class="QLineEdit" name="a">
               <property name="geometry"><rect><x>10</x><y>20</y><width>100</width><height>24</height></rect></property>
             </widget>
             <widget class="QLabel" name="b"/>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    let root = built.widget().unwrap();
    assert_eq!(root.layout, Some(LayoutKind::Canvas));
    assert_eq!(root.children.len(), 2);
    assert_eq!(
        built.tree.by_name("a").unwrap().placement,
        Placement::Absolute(Rect {
            x: 10,
            y: 20,
            width: 100,
            height: 24
        })
    );
    assert_eq!(
        built.tree.by_name("b").unwrap().placement,
        Placement::Absolute(Rect::default())
    );
}

#[test]
fn single_top_level_child_is_returned_directly() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <property name="windowTitle"><string>Posix</string></property>
             <widget class="QGroupBox" name="box">
               <layout class="QVBoxLayout"><item><widget class="QLineEdit" name="a"/></item></layout>
             </widget>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    let root = built.widget().unwrap();
    assert_eq!(root.name, "box");
    assert_eq!(root.kind, WidgetKind::GroupBox);
    assert!(root.parent.is_none());
    assert_eq!(built.properties.get_str("windowTitle"), Some("Posix"));
}

#[test]
fn box_flex_follows_policy_table_and_stretch() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <layout class="QHBoxLayout">
               <property name="stretch"><string>0,0,3</string></property>
               <item><widget class="QLineEdit" name="expanding">
                 <property name="sizePolicy"><sizepolicy hsizetype="Expanding" vsizetype="Fixed"/></property>
               </widget></item>
               <item><widget class="QLineEdit" name="fixed">
                 <property name="sizePolicy"><sizepolicy hsizetype="Fixed" vsizetype="Fixed"/></property>
               </widget></item>
               <item><widget class="QLineEdit" name="stretched"/></item>
               <item><widget class="QLineEdit" name="plain"/></item>
               <item><widget class="QLineEdit" name="own_stretch">
                 <property name="sizePolicy"><sizepolicy hsizetype="Fixed" vsizetype="Fixed"><horstretch>7</horstretch></sizepolicy></property>
               </widget></item>
               <item><spacer name="gap"/></item>
             </layout>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    let flex = |name: &str| match built.tree.by_name(name).unwrap().placement {
        Placement::Box { flex, .. } => flex,
        other => panic!("{} is not in a box: {:?}", name, other),
    };
    assert_eq!(flex("expanding"), 4);
    assert_eq!(flex("fixed"), 0);
    assert_eq!(flex("stretched"), 3);
    assert_eq!(flex("plain"), 1);
    assert_eq!(flex("own_stretch"), 7);
    // Spacers default to Expanding.
    assert_eq!(flex("gap"), 4);
    assert_eq!(built.tree.by_name("gap").unwrap().kind, WidgetKind::Spacer);
}

#[test]
fn vertical_box_uses_vertical_policy() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <layout class="QVBoxLayout">
               <item><widget class="QTextEdit" name="notes">
                 <property name="sizePolicy"><sizepolicy hsizetype="Fixed" vsizetype="QSizePolicy::MinimumExpanding"/></property>
               </widget></item>
               <item><widget class="QLabel" name="hint">
                 <property name="sizePolicy"><sizepolicy hsizetype="Expanding" vsizetype="Maximum"/></property>
               </widget></item>
             </layout>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    assert_eq!(
        built.tree.by_name("notes").unwrap().placement,
        Placement::Box { index: 0, flex: 2 }
    );
    assert_eq!(
        built.tree.by_name("hint").unwrap().placement,
        Placement::Box { index: 1, flex: 10 }
    );
}

#[test]
fn form_layout_roles_and_nested_layouts() {
    let xml = wrap(
        r#"<widget class="QWidget" name="root">
             <layout class="QFormLayout">
               <item row="0" column="0"><widget class="QLabel" name="l"/></item>
               <item row="0" column="1"><widget class="QSpinBox" name="f"/></item>
               <item row="1" column="0" colspan="2">
                 <layout class="QHBoxLayout" name="buttons">
                   <item><widget class="QPushButton" name="ok"/></item>
                 </layout>
               </item>
             </layout>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    assert_eq!(
        built.tree.by_name("l").unwrap().placement,
        Placement::Form { row: 0, role: FormRole::Label }
    );
    assert_eq!(
        built.tree.by_name("f").unwrap().placement,
        Placement::Form { row: 0, role: FormRole::Field }
    );
    let buttons = built.tree.by_name("buttons").unwrap();
    assert_eq!(buttons.kind, WidgetKind::Container);
    assert_eq!(buttons.layout, Some(LayoutKind::Horizontal));
    assert_eq!(buttons.placement, Placement::Form { row: 1, role: FormRole::Spanning });
    let ok = built.tree.find("ok").unwrap();
    assert_eq!(built.tree.depth(ok), 2);
}

#[test]
fn tab_widget_children_become_pages() {
    let xml = wrap(
        r#"<widget class="QTabWidget" name="tabs">
             <widget class="QWidget" name="general"/>
             <widget class="QWidget" name="advanced"/>
           </widget>"#,
    );
    let built = builder().build(&xml).unwrap();
    assert_eq!(built.widget().unwrap().kind, WidgetKind::TabWidget);
    assert_eq!(
        built.tree.by_name("advanced").unwrap().placement,
        Placement::Page { index: 1 }
    );
}

#[test]
fn custom_registry_maps_new_classes() {
    let mut registry = WidgetRegistry::standard();
    registry.register("QFancyDial", |n| dirform_template::WidgetNode::new(n, WidgetKind::SpinBox));
    let built = TemplateBuilder::new(registry, BuilderConfig::default())
        .build(USER_FORM)
        .unwrap();
    assert_eq!(built.tree.by_name("dial").unwrap().kind, WidgetKind::SpinBox);
    assert_eq!(built.bindings.widget_for("gecos"), Some("hiddenInside"));
}

// ── Context ─────────────────────────────────────────────────────

#[test]
fn context_metadata() {
    let ctx = Context::base(builder().build(USER_FORM).unwrap());
    assert_eq!(ctx.name(), "User");
    assert_eq!(ctx.title(), "Generic user");
    assert_eq!(ctx.icon(), Some(":/icons/user.png"));
    assert!(ctx.extension().is_none());
    assert!(!ctx.has_appeared());
    assert_eq!(ctx.display_label("uid"), "Login");
    assert_eq!(ctx.display_label("unbound"), "unbound");

    let ext = Context::for_extension("PosixUser", builder().build(&wrap(r#"<widget class="QLineEdit" name="a"/>"#)).unwrap());
    assert_eq!(ext.name(), "PosixUser");
    assert_eq!(ext.title(), "PosixUser");
    assert_eq!(ext.icon(), None);

    let tabbed = Context::for_extension(
        "SambaUser",
        builder()
            .build(&wrap(
                r#"<widget class="QWidget" name="SambaUser">
                 <property name="windowTitle"><string>Samba settings</string></property>
                 <property name="tabTitle"><string>Samba</string></property>
                 <property name="icon"><iconset><normaloff>:/icons/samba.png</normaloff></iconset></property>
                 <layout class="QVBoxLayout"><item><widget class="QLineEdit" name="a"/></item></layout>
                </widget>"#,
            ))
            .unwrap(),
    );
    assert_eq!(tabbed.title(), "Samba");
    assert_eq!(tabbed.icon(), Some(":/icons/samba.png"));
}

#[test]
fn flags_propagate_to_buddy_and_drive_validity() {
    let mut ctx = Context::base(builder().build(USER_FORM).unwrap());
    assert!(ctx.is_valid());

    let flags = WidgetFlags {
        mandatory: true,
        ..WidgetFlags::default()
    };
    assert!(ctx.apply_flags("mail", flags));
    assert!(ctx.buddy("mailEdit").unwrap().flags.mandatory);
    assert!(!ctx.is_valid());
    assert_eq!(ctx.invalid_widgets(), vec!["mailEdit"]);

    ctx.bound_widget_mut("mail").unwrap().set_value(vec![json!("a@example.org")]);
    assert!(ctx.is_valid());
    assert!(!ctx.apply_flags("unbound", WidgetFlags::default()));
}

#[test]
fn blocking_exempts_mandatory_widget() {
    let mut ctx = Context::base(builder().build(USER_FORM).unwrap());
    ctx.apply_flags(
        "mail",
        WidgetFlags {
            mandatory: true,
            ..WidgetFlags::default()
        },
    );
    assert!(!ctx.is_valid());

    let changed = ctx.update_blocking("mailEdit", |attr| {
        assert_eq!(attr, "noMail");
        vec![json!(true)]
    });
    assert!(changed);
    assert!(ctx.widget("mailEdit").unwrap().is_blocked());
    assert!(ctx.buddy("mailEdit").unwrap().is_blocked());
    assert!(ctx.is_valid());

    // Same outcome again is not a change.
    assert!(!ctx.update_blocking("mailEdit", |_| vec![json!("true")]));

    assert!(ctx.update_blocking("mailEdit", |_| vec![json!(false)]));
    assert!(!ctx.is_valid());
}
