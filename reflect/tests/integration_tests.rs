use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta};
use msgshape_core::*;
use msgshape_reflect::{
    BindErrorKind, DynamicMessage, ObjectImpl, OneofImpl, ScalarValue, Value, ValueContext,
};
use rust_decimal::Decimal;

// =============================================================================
// Helpers
// =============================================================================

fn message(name: &str) -> FieldKind {
    FieldKind::Message(name.to_string())
}

fn fixture_pool() -> DescriptorPool {
    let mut pool = DescriptorPool::new();

    pool.add_enum(EnumDescriptor::new(
        "test.v1",
        "Status",
        &[("STATUS_UNSPECIFIED", 0), ("STATUS_ACTIVE", 1), ("STATUS_DONE", 2)],
    ));

    pool.add_message(
        MessageDescriptor::new("people.v1", "Person")
            .with_field(FieldDescriptor::new(1, "name", FieldKind::String)),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Audit")
            .with_field(FieldDescriptor::new(1, "created_by", FieldKind::String))
            .with_field(FieldDescriptor::new(2, "updated_by", FieldKind::String)),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Task")
            .with_field(FieldDescriptor::new(1, "id", FieldKind::String).required())
            .with_field(FieldDescriptor::repeated(2, "tags", FieldKind::String))
            .with_field(FieldDescriptor::new(
                3,
                "status",
                FieldKind::Enum("test.v1.Status".into()),
            ))
            .with_field(FieldDescriptor::new(4, "audit", message("test.v1.Audit")).flattened())
            .with_field(FieldDescriptor::new(5, "owner", message("people.v1.Person")))
            .with_field(FieldDescriptor::map(
                6,
                "labels",
                FieldKind::String,
                FieldKind::String,
            ))
            .with_field(FieldDescriptor::new(7, "parent", message("test.v1.Task"))),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Card")
            .with_field(FieldDescriptor::new(1, "number", FieldKind::String)),
    );
    pool.add_message(
        MessageDescriptor::new("test.v1", "Transfer")
            .with_field(FieldDescriptor::new(1, "iban", FieldKind::String)),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Payment")
            .with_oneof(OneofDescriptor::new("type"))
            .with_field(FieldDescriptor::new(1, "card", message("test.v1.Card")).in_oneof(0))
            .with_field(
                FieldDescriptor::new(2, "transfer", message("test.v1.Transfer")).in_oneof(0),
            ),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Order")
            .with_oneof(OneofDescriptor::exposed("method"))
            .with_field(FieldDescriptor::new(1, "id", FieldKind::String))
            .with_field(FieldDescriptor::new(2, "card", message("test.v1.Card")).in_oneof(0))
            .with_field(FieldDescriptor::new(3, "cash", FieldKind::String).in_oneof(0))
            .with_field(FieldDescriptor::new(4, "note", FieldKind::String)),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Cart")
            .with_field(FieldDescriptor::repeated(1, "items", message("test.v1.Card")))
            .with_field(FieldDescriptor::map(
                2,
                "saved",
                FieldKind::String,
                message("test.v1.Card"),
            )),
    );

    pool.add_message(
        MessageDescriptor::new("test.v1", "Reading")
            .with_field(FieldDescriptor::new(
                1,
                "taken_at",
                message("google.protobuf.Timestamp"),
            ))
            .with_field(FieldDescriptor::new(
                2,
                "elapsed",
                message("google.protobuf.Duration"),
            ))
            .with_field(FieldDescriptor::new(3, "day", message("google.type.Date")))
            .with_field(FieldDescriptor::new(4, "amount", message("google.type.Decimal")))
            .with_field(FieldDescriptor::new(5, "count", FieldKind::Int64))
            .with_field(FieldDescriptor::new(6, "ratio", FieldKind::Double))
            .with_field(FieldDescriptor::new(7, "payload", message("google.protobuf.Any")))
            .with_field(FieldDescriptor::repeated(
                8,
                "states",
                FieldKind::Enum("test.v1.Status".into()),
            ))
            .with_field(FieldDescriptor::new(9, "raw", FieldKind::Bytes))
            .with_field(FieldDescriptor::new(10, "small", FieldKind::Uint32)),
    );

    pool
}

fn build(names: &[&str]) -> SchemaSet {
    let pool = fixture_pool();
    let mut builder = SchemaBuilder::new(&pool);
    for name in names {
        builder.build_message(name).unwrap();
    }
    builder.finish().unwrap()
}

fn id_of(set: &SchemaSet, name: &str) -> SchemaId {
    set.lookup(name).unwrap()
}

fn string(value: &str) -> Option<ScalarValue> {
    Some(ScalarValue::from(value))
}

fn nested_mut(msg: &mut DynamicMessage, number: u32) -> &mut DynamicMessage {
    match msg.get_field_mut(number) {
        Some(Value::Message(inner)) => inner,
        other => panic!("expected message at field {number}, got {other:?}"),
    }
}

// =============================================================================
// Objects: scalars, arrays, enums
// =============================================================================

#[test]
fn test_task_scenario_round_trip() {
    let set = build(&["test.v1.Task"]);
    let task = id_of(&set, "test.v1.Task");
    let mut msg = DynamicMessage::new();

    let mut obj = ObjectImpl::bind(&set, task, &mut msg).unwrap();
    obj.set_scalar("id", "x").unwrap();
    {
        let mut tags = obj.array("tags").unwrap();
        tags.append_scalar("a").unwrap();
        tags.append_scalar("b").unwrap();
    }
    obj.set_enum("status", "ACTIVE").unwrap();

    assert!(obj.is_set("id").unwrap());
    assert_eq!(obj.get_scalar("id").unwrap(), string("x"));

    {
        let tags = obj.array("tags").unwrap();
        assert_eq!(tags.len().unwrap(), 2);
        assert_eq!(
            tags.scalars().unwrap(),
            [ScalarValue::from("a"), ScalarValue::from("b")]
        );
    }

    let status = obj.get_enum("status").unwrap().unwrap();
    assert_eq!(status.name, "ACTIVE");
    assert_eq!(status.number, 1);

    assert!(!obj.is_set("createdBy").unwrap());
    assert_eq!(obj.get_scalar("createdBy").unwrap(), None);

    drop(obj);
    assert_eq!(msg.get_field(3), Some(&Value::EnumNumber(1)));
}

#[test]
fn test_properties_follow_schema_order() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    let obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();

    let names: Vec<&str> = obj.properties().iter().map(|p| p.name()).collect();
    assert_eq!(
        names,
        ["id", "tags", "status", "createdBy", "updatedBy", "owner", "labels", "parent"]
    );
    assert_eq!(
        obj.properties().get("updatedBy").unwrap().context(),
        &ValueContext::Field {
            container: Default::default(),
            path: vec![4, 2],
        }
    );
    assert!(obj.properties().get("missing").is_none());
}

#[test]
fn test_enum_prefix_and_unknown_names() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();

    let mut status = obj.enumeration("status").unwrap();
    status.set("DONE").unwrap();
    assert_eq!(status.get().unwrap().unwrap().name, "DONE");
    assert_eq!(status.number().unwrap(), Some(2));

    let err = status.set("STATUS_DONE").unwrap_err();
    assert_eq!(err.kind, BindErrorKind::UnknownEnumName("STATUS_DONE".into()));
    assert_eq!(err.path.to_string(), "test.v1.Task.status");

    // matched case-sensitively
    assert!(status.set("done").is_err());

    let err = status.set_number(7).unwrap_err();
    assert_eq!(err.kind, BindErrorKind::UnknownEnumNumber(7));
    assert_eq!(status.number().unwrap(), Some(2));
}

#[test]
fn test_enum_number_absent_from_schema() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    msg.set_field(3, Value::EnumNumber(9));

    let obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();
    let err = obj.get_enum("status").unwrap_err();
    assert_eq!(err.kind, BindErrorKind::UnknownEnumNumber(9));
    assert_eq!(
        err.to_string(),
        "test.v1.Task.status: enum number 9 is not defined by the schema"
    );
}

#[test]
fn test_wrong_accessor_kind() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();

    let err = obj.array("id").err().unwrap();
    assert_eq!(
        err.kind,
        BindErrorKind::WrongKind {
            expected: "array",
            found: "scalar",
        }
    );
    assert_eq!(
        err.to_string(),
        "test.v1.Task.id: expected array property, found scalar"
    );

    let err = obj.set_scalar("id", 5i32).unwrap_err();
    assert_eq!(
        err.kind,
        BindErrorKind::WrongShape {
            expected: "string",
            found: "int32",
        }
    );

    let err = obj.property("nope").err().unwrap();
    assert_eq!(err.kind, BindErrorKind::UnknownProperty("nope".into()));
    drop(obj);
    assert!(msg.is_empty());
}

// =============================================================================
// Materialization and flattening
// =============================================================================

#[test]
fn test_reads_do_not_materialize() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    {
        let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();
        let names: Vec<String> = obj
            .properties()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        for name in &names {
            assert!(!obj.is_set(name).unwrap(), "{name} should be unset");
        }

        let owner = obj.object("owner").unwrap();
        assert!(!owner.is_materialized());
        assert_eq!(owner.get_scalar("name").unwrap(), None);
    }
    assert!(msg.is_empty());
}

#[test]
fn test_nested_write_materializes_ancestors() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    {
        let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();
        obj.object("parent")
            .unwrap()
            .object("owner")
            .unwrap()
            .set_scalar("name", "ann")
            .unwrap();

        assert!(obj.is_set("parent").unwrap());
        let mut parent = obj.object("parent").unwrap();
        assert!(parent.is_materialized());
        assert!(!parent.is_set("id").unwrap());
        assert!(parent.is_set("owner").unwrap());
        assert!(!parent.object("parent").unwrap().is_materialized());
    }

    let parent = nested_mut(&mut msg, 7);
    let owner = nested_mut(parent, 5);
    assert_eq!(owner.get_field(1), Some(&Value::String("ann".into())));
}

#[test]
fn test_explicit_materialize() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    {
        let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();
        let mut owner = obj.object("owner").unwrap();
        owner.materialize().unwrap();
        assert!(owner.is_materialized());
        assert!(!owner.is_set("name").unwrap());
        drop(owner);
        assert!(obj.is_set("owner").unwrap());
    }
    assert_eq!(msg.get_field(5), Some(&Value::Message(DynamicMessage::new())));
}

#[test]
fn test_flattened_write_is_visible_through_own_schema() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    {
        let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();
        obj.set_scalar("createdBy", "me").unwrap();
        assert!(obj.is_set("createdBy").unwrap());
        assert!(!obj.is_set("updatedBy").unwrap());
    }

    let audit_set = build(&["test.v1.Audit"]);
    let audit = id_of(&audit_set, "test.v1.Audit");
    let inner = nested_mut(&mut msg, 4);
    let audit_obj = ObjectImpl::bind(&audit_set, audit, inner).unwrap();
    assert_eq!(audit_obj.get_scalar("createdBy").unwrap(), string("me"));
    assert!(!audit_obj.is_set("updatedBy").unwrap());
}

#[test]
fn test_clear_leaves_container() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();

    obj.set_scalar("updatedBy", "bob").unwrap();
    obj.clear("updatedBy").unwrap();
    assert!(!obj.is_set("updatedBy").unwrap());
    drop(obj);
    assert_eq!(msg.get_field(4), Some(&Value::Message(DynamicMessage::new())));
}

// =============================================================================
// Oneofs and promoted unions
// =============================================================================

#[test]
fn test_oneof_reports_single_set_property() {
    let set = build(&["test.v1.Payment"]);
    let payment = id_of(&set, "test.v1.Payment");
    let mut msg = DynamicMessage::new();
    let mut oneof = OneofImpl::bind(&set, payment, &mut msg).unwrap();

    assert!(oneof.which_one_set().unwrap().is_none());

    oneof
        .object("card")
        .unwrap()
        .set_scalar("number", "4242")
        .unwrap();
    let chosen = oneof.which_one_set().unwrap().unwrap();
    assert_eq!(chosen.name(), "card");
}

#[test]
fn test_oneof_multiple_set_is_detected() {
    let set = build(&["test.v1.Payment"]);
    let payment = id_of(&set, "test.v1.Payment");
    let mut msg = DynamicMessage::new();
    let mut oneof = OneofImpl::bind(&set, payment, &mut msg).unwrap();

    oneof.object("card").unwrap().materialize().unwrap();
    oneof
        .object("transfer")
        .unwrap()
        .set_scalar("iban", "DE00")
        .unwrap();

    let err = oneof.which_one_set().unwrap_err();
    assert_eq!(
        err.kind,
        BindErrorKind::MultipleSet(vec!["card".into(), "transfer".into()])
    );
    assert_eq!(err.path.to_string(), "test.v1.Payment");

    // the binding never clears competing branches itself
    oneof.clear("card").unwrap();
    assert_eq!(oneof.which_one_set().unwrap().unwrap().name(), "transfer");
}

#[test]
fn test_promoted_union_writes_parent_fields() {
    let set = build(&["test.v1.Order"]);
    let order = id_of(&set, "test.v1.Order");
    let mut msg = DynamicMessage::new();
    {
        let mut obj = ObjectImpl::bind(&set, order, &mut msg).unwrap();
        assert!(!obj.is_set("method").unwrap());
        assert!(obj.properties().get("method").unwrap().context().is_virtual());

        obj.oneof("method").unwrap().set_scalar("cash", "10").unwrap();
        obj.set_scalar("note", "fragile").unwrap();
        assert!(obj.is_set("method").unwrap());

        let method = obj.oneof("method").unwrap();
        assert_eq!(method.which_one_set().unwrap().unwrap().name(), "cash");
        assert_eq!(method.path().to_string(), "test.v1.Order.method");
    }
    assert_eq!(msg.get_field(3), Some(&Value::String("10".into())));

    let mut obj = ObjectImpl::bind(&set, order, &mut msg).unwrap();
    obj.clear("method").unwrap();
    assert!(!obj.is_set("method").unwrap());
    assert!(obj.is_set("note").unwrap());
    drop(obj);
    assert!(!msg.has_field(3));
}

#[test]
fn test_bind_checks_root_kind() {
    let set = build(&["test.v1.Task", "test.v1.Payment"]);
    let mut msg = DynamicMessage::new();

    let err = OneofImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg)
        .err()
        .unwrap();
    assert_eq!(
        err.kind,
        BindErrorKind::WrongKind {
            expected: "oneof",
            found: "object",
        }
    );

    let err = ObjectImpl::bind(&set, id_of(&set, "test.v1.Payment"), &mut msg)
        .err()
        .unwrap();
    assert_eq!(err.path.to_string(), "test.v1.Payment");
}

#[test]
fn test_bind_requires_linked_set() {
    let pool = fixture_pool();
    let mut builder = SchemaBuilder::new(&pool);
    let task = builder.build_message("test.v1.Task").unwrap();

    let mut msg = DynamicMessage::new();
    let err = ObjectImpl::bind(builder.set(), task, &mut msg).err().unwrap();
    assert_eq!(err.kind, BindErrorKind::Unlinked("test.v1.Task".into()));
}

// =============================================================================
// Arrays and maps
// =============================================================================

#[test]
fn test_array_of_messages() {
    let set = build(&["test.v1.Cart"]);
    let cart = id_of(&set, "test.v1.Cart");
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, cart, &mut msg).unwrap();

    let mut items = obj.array("items").unwrap();
    items
        .append()
        .unwrap()
        .as_object()
        .unwrap()
        .set_scalar("number", "1")
        .unwrap();
    items
        .append()
        .unwrap()
        .as_object()
        .unwrap()
        .set_scalar("number", "2")
        .unwrap();

    assert_eq!(items.len().unwrap(), 2);
    let contexts = items.contexts().unwrap();
    assert!(matches!(
        contexts[1],
        ValueContext::ListElement { index: 1, .. }
    ));

    let second = items.element(1).unwrap().as_object().unwrap();
    assert_eq!(second.get_scalar("number").unwrap(), string("2"));
    assert_eq!(second.path().to_string(), "test.v1.Cart.items[1]");
    drop(second);

    let err = items.element(5).err().unwrap();
    assert_eq!(err.kind, BindErrorKind::IndexOutOfBounds { index: 5, len: 2 });
    assert_eq!(err.path.to_string(), "test.v1.Cart.items[5]");

    let err = items.append_scalar("x").unwrap_err();
    assert_eq!(
        err.kind,
        BindErrorKind::WrongKind {
            expected: "scalar",
            found: "object",
        }
    );
}

#[test]
fn test_scalar_map() {
    let set = build(&["test.v1.Task"]);
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, id_of(&set, "test.v1.Task"), &mut msg).unwrap();

    let mut labels = obj.map("labels").unwrap();
    assert!(labels.is_empty().unwrap());
    labels.set_scalar("team", "core").unwrap();
    labels.set_scalar("env", "prod").unwrap();

    assert_eq!(labels.keys().unwrap(), ["env", "team"]);
    assert_eq!(labels.get_scalar("env").unwrap(), string("prod"));
    assert_eq!(labels.get_scalar("zone").unwrap(), None);

    let entries = labels.entries().unwrap();
    assert_eq!(entries[0].0, "env");
    assert!(matches!(&entries[0].1, ValueContext::MapEntry { key, .. } if key == "env"));

    let err = labels.set_scalar("env", true).unwrap_err();
    assert_eq!(err.path.to_string(), "test.v1.Task.labels[\"env\"]");

    assert!(labels.remove("team").unwrap());
    assert!(!labels.remove("team").unwrap());
    assert_eq!(labels.len().unwrap(), 1);
    drop(labels);
    assert!(obj.is_set("labels").unwrap());
}

#[test]
fn test_message_map() {
    let set = build(&["test.v1.Cart"]);
    let cart = id_of(&set, "test.v1.Cart");
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, cart, &mut msg).unwrap();

    let mut saved = obj.map("saved").unwrap();
    saved
        .insert("main")
        .unwrap()
        .as_object()
        .unwrap()
        .set_scalar("number", "9")
        .unwrap();

    let main = saved.entry("main").unwrap().as_object().unwrap();
    assert_eq!(main.get_scalar("number").unwrap(), string("9"));
    drop(main);

    let err = saved.entry("spare").err().unwrap();
    assert_eq!(err.kind, BindErrorKind::MissingSlot);
    assert_eq!(err.path.to_string(), "test.v1.Cart.saved[\"spare\"]");
}

// =============================================================================
// Well-known scalars and untyped values
// =============================================================================

#[test]
fn test_structured_scalars() {
    let set = build(&["test.v1.Reading"]);
    let reading = id_of(&set, "test.v1.Reading");
    let mut msg = DynamicMessage::new();

    let taken_at = DateTime::from_timestamp(1_700_000_000, 5).unwrap();
    let elapsed = TimeDelta::seconds(90);
    let day = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    let amount = Decimal::from_str("19.99").unwrap();
    {
        let mut obj = ObjectImpl::bind(&set, reading, &mut msg).unwrap();
        obj.set_scalar("takenAt", taken_at).unwrap();
        obj.set_scalar("elapsed", elapsed).unwrap();
        obj.set_scalar("day", day).unwrap();
        obj.set_scalar("amount", amount).unwrap();
        obj.set_scalar("count", 3i64).unwrap();
        obj.set_scalar("ratio", 0.5f64).unwrap();
        obj.set_scalar("raw", vec![1u8, 2]).unwrap();
        obj.set_scalar("small", 7u32).unwrap();

        assert_eq!(
            obj.get_scalar("takenAt").unwrap(),
            Some(ScalarValue::Timestamp(taken_at))
        );
        assert_eq!(
            obj.get_scalar("elapsed").unwrap(),
            Some(ScalarValue::Duration(elapsed))
        );
        assert_eq!(obj.get_scalar("day").unwrap(), Some(ScalarValue::Date(day)));
        assert_eq!(
            obj.get_scalar("amount").unwrap(),
            Some(ScalarValue::Decimal(amount))
        );
        assert_eq!(obj.get_scalar("count").unwrap(), Some(ScalarValue::Int64(3)));
        assert_eq!(obj.get_scalar("small").unwrap(), Some(ScalarValue::Uint32(7)));

        let err = obj.set_scalar("count", 3i32).unwrap_err();
        assert_eq!(
            err.kind,
            BindErrorKind::WrongShape {
                expected: "int64",
                found: "int32",
            }
        );
        let err = obj.set_scalar("day", taken_at).unwrap_err();
        assert_eq!(
            err.kind,
            BindErrorKind::WrongShape {
                expected: "date",
                found: "date-time",
            }
        );
    }

    let stored = nested_mut(&mut msg, 4);
    assert_eq!(stored.get_field(1), Some(&Value::String("19.99".into())));
    assert_eq!(msg.get_field(6), Some(&Value::F64(0.5)));
}

#[test]
fn test_enum_array_and_any() {
    let set = build(&["test.v1.Reading"]);
    let reading = id_of(&set, "test.v1.Reading");
    let mut msg = DynamicMessage::new();
    let mut obj = ObjectImpl::bind(&set, reading, &mut msg).unwrap();

    {
        let mut states = obj.array("states").unwrap();
        states.append_enum("ACTIVE").unwrap();
        states.append_enum("DONE").unwrap();
        let names: Vec<&str> = states
            .options()
            .unwrap()
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, ["ACTIVE", "DONE"]);

        let err = states.append_enum("PAUSED").unwrap_err();
        assert_eq!(err.path.to_string(), "test.v1.Reading.states[2]");
    }

    let mut payload = DynamicMessage::new();
    payload.set_field(1, Value::Bool(true));
    let mut any = obj.any("payload").unwrap();
    assert!(!any.is_set());
    any.set(payload.clone()).unwrap();
    assert_eq!(any.get().unwrap(), Some(&payload));
}
