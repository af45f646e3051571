//! End-to-end compilation: source text in, encoded payloads out.

use kdl_core::{
    compile, compile_str, CompileOptions, Decoder, Diagnostic, ErrorKind, Format, InMemoryProvider,
    Instance, Project, Rect, ResourceReference, TypeCode, ValueContainer,
};

fn compiled(source: &str) -> Project {
    compile_str(source, CompileOptions::default())
        .unwrap_or_else(|diag| panic!("compilation failed:\n{}", diag.report()))
}

fn failure(source: &str) -> Diagnostic {
    compile_str(source, CompileOptions::default()).expect_err("compilation should fail")
}

fn resource<'a>(project: &'a Project, namespace: &str, code: &str, id: i64) -> &'a Instance {
    project
        .get_unit("output")
        .and_then(|unit| unit.get(namespace))
        .and_then(|ns| ns.get(TypeCode::parse(code).unwrap()))
        .and_then(|container| container.instance(id))
        .unwrap_or_else(|| panic!("no resource {}#{}", code, id))
}

const SIMPLE: &str = r#"
type Simple : "simp" {
    template { DWRD "Value"; };
    field("Value");
};
"#;

#[test]
fn single_word_resource() {
    let project = compiled(&format!(
        "{}\ndeclare Simple {{ new (#128) {{ Value = 42; }}; }};",
        SIMPLE
    ));
    assert_eq!(resource(&project, "", "simp", 128).data, vec![0x00, 0x2A]);
}

#[test]
fn unassigned_slots_encode_as_zero() {
    let project = compiled(&format!("{}\ndeclare Simple {{ new (#1) {{}}; }};", SIMPLE));
    assert_eq!(resource(&project, "", "simp", 1).data, vec![0, 0]);
}

#[test]
fn constructor_computes_values() {
    let project = compiled(
        r#"type Doubled : "dubl" {
            template { DWRD "x"; };
            field("x");
            constructor(a) { x = a * 2; };
        };
        declare Doubled { new (#1) { Doubled(5); }; };"#,
    );
    let doubled = resource(&project, "", "dubl", 1);
    assert_eq!(doubled.value("x"), Some(&ValueContainer::Integer(10)));
    assert_eq!(doubled.data, vec![0, 10]);
}

#[test]
fn nested_types_are_built_by_their_constructor() {
    let project = compiled(
        r#"type Point : "pnt " {
            template { DWRD "X"; DWRD "Y"; };
            field("X");
            field("Y");
            constructor(x, y) { X = x; Y = y; };
        };
        type Marker : "mark" {
            template { Nested<Point> "At"; DBYT "Kind"; };
            field("At");
            field("Kind");
        };
        declare Marker { new (#1) { At = Point(3, 4); Kind = 2; }; };"#,
    );
    let marker = resource(&project, "", "mark", 1);
    assert_eq!(marker.value("At.X"), Some(&ValueContainer::Integer(3)));
    assert_eq!(marker.data, vec![0, 3, 0, 4, 2]);
}

#[test]
fn nested_slots_repeat_inside_a_list() {
    let project = compiled(
        r#"type Point : "pnt " {
            template { DWRD "X"; DWRD "Y"; };
            field("X");
            field("Y");
            constructor(x, y) { X = x; Y = y; };
        };
        type Route : "rout" {
            template {
                OCNT "Count";
                LSTC "Begin";
                Nested<Point> "Stop";
                BBIT "Rest";
                LSTE "End";
                DBYT "Tail";
            };
            field("Stop") repeatable<4> { Stop; Rest; };
            field("Tail");
        };
        declare Route {
            new (#1) {
                Stop = Point(1, 2), 1;
                Stop = Point(3, 4), 0;
                Tail = 9;
            };
        };"#,
    );
    let route = resource(&project, "", "rout", 1);
    assert_eq!(route.value("Count"), Some(&ValueContainer::Integer(2)));
    assert_eq!(route.value("Stop[0].X"), Some(&ValueContainer::Integer(1)));
    assert_eq!(route.value("Stop[1].Y"), Some(&ValueContainer::Integer(4)));
    assert_eq!(
        route.data,
        vec![0, 2, 0, 1, 0, 2, 0x80, 0, 3, 0, 4, 0x00, 9]
    );

    let definition = project.types.get("Route").unwrap();
    let decoded = Decoder::new(&project.types, project.format)
        .decode(definition, &route.data)
        .unwrap();
    assert_eq!(decoded, route.values);
}

#[test]
fn bits_pack_msb_first_and_flush_before_bytes() {
    let project = compiled(
        r#"type Flags : "flgs" {
            template { BBIT "A"; BBIT "B"; BBIT "C"; DBYT "After"; };
            field("A"); field("B"); field("C"); field("After");
        };
        declare Flags { new (#1) { A = 1; C = true; After = 9; }; };"#,
    );
    assert_eq!(resource(&project, "", "flgs", 1).data, vec![0xA0, 9]);
}

#[test]
fn rect_builtin_fills_a_rect_slot() {
    let project = compiled(
        r#"type Frame : "frme" {
            template { RECT "Bounds"; CSTR "Title"; };
            field("Bounds");
            field("Title");
        };
        declare Frame { new (#1) { Bounds = rect(1, 2, 3, 4); Title = "ok"; }; };"#,
    );
    let frame = resource(&project, "", "frme", 1);
    assert_eq!(
        frame.value("Bounds"),
        Some(&ValueContainer::Rect(Rect {
            top: 1,
            left: 2,
            bottom: 3,
            right: 4
        }))
    );
    assert_eq!(frame.data, vec![0, 1, 0, 2, 0, 3, 0, 4, b'o', b'k', 0]);
}

#[test]
fn extended_references_carry_namespace_and_type() {
    let project = compiled(
        r#"@format set extended;
        type Link : "link" { template { RSRC "Target"; }; field("Target"); };
        declare Ui.Link { new (#1) { Target = #Ui.Link.7; }; };"#,
    );
    let link = resource(&project, "Ui", "link", 1);
    assert_eq!(
        link.data,
        vec![0x03, 2, b'U', b'i', b'l', b'i', b'n', b'k', 0, 0, 0, 0, 0, 0, 0, 7]
    );

    let definition = project.types.get("Link").unwrap();
    let decoded = Decoder::new(&project.types, project.format)
        .decode(definition, &link.data)
        .unwrap();
    assert_eq!(
        decoded.get("Target"),
        Some(&ValueContainer::Reference(
            ResourceReference::typed("Link", 7).in_container("Ui")
        ))
    );
}

#[test]
fn classic_references_are_sixteen_bit() {
    let project = compiled(
        r#"type Link : "link" { template { RSRC "Target"; }; field("Target"); };
        declare Link { new (#1) { Target = #300; }; };"#,
    );
    assert_eq!(project.format, Format::Classic);
    assert_eq!(resource(&project, "", "link", 1).data, vec![0x01, 0x2C]);

    let diag = failure(
        r#"type Link : "link" { template { RSRC "Target"; }; field("Target"); };
        declare Link { new (#1) { Target = #70000; }; };"#,
    );
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
}

#[test]
fn encoded_payloads_decode_to_their_values() {
    let project = compiled(
        r#"type Mixed : "mixd" {
            template {
                HBYT "Small";
                DLNG "Large";
                PSTR "Label";
                OCNT "Count";
                LSTC "Begin";
                HWRD "Entry";
                LSTE "End";
            };
            field("Small");
            field("Large");
            field("Label");
            field("Entry") repeatable<4>;
        };
        declare Mixed {
            new (#1) {
                Small = 0xFF;
                Large = -2;
                Label = "mixed";
                Entry = 10;
                Entry = 20;
            };
        };"#,
    );
    let mixed = resource(&project, "", "mixd", 1);
    let definition = project.types.get("Mixed").unwrap();
    let decoded = Decoder::new(&project.types, project.format)
        .decode(definition, &mixed.data)
        .unwrap();
    assert_eq!(decoded, mixed.values);
}

#[test]
fn imports_resolve_relative_to_the_importer() {
    let provider = InMemoryProvider::new()
        .with_file(
            "game/main.kdl",
            r#"@import "defs/simple.kdl";
            @import "defs/simple.kdl";
            declare Simple { new (#1) { Value = 7; }; };"#,
        )
        .with_file("game/defs/simple.kdl", SIMPLE);
    let project = compile("game/main.kdl", &provider, CompileOptions::default()).unwrap();
    assert_eq!(project.types.len(), 1);
    assert_eq!(resource(&project, "", "simp", 1).data, vec![0, 7]);
}

#[test]
fn import_cycles_are_rejected() {
    let provider = InMemoryProvider::new()
        .with_file("a.kdl", r#"@import "b.kdl";"#)
        .with_file("b.kdl", r#"@import "a.kdl";"#);
    let diag = compile("a.kdl", &provider, CompileOptions::default()).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::DuplicateDefinition);
    assert!(diag.info.iter().any(|line| line.contains("a.kdl -> b.kdl -> a.kdl")));
}

#[test]
fn missing_import_is_an_io_error() {
    let provider = InMemoryProvider::new().with_file("main.kdl", r#"@import "gone.kdl";"#);
    let diag = compile("main.kdl", &provider, CompileOptions::default()).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::Io);
    assert!(diag.location.is_some());
}

#[test]
fn format_option_is_the_starting_format() {
    let options = CompileOptions {
        format: Format::Rez,
        ..CompileOptions::default()
    };
    let project = compile_str("@format requires rez;", options).unwrap();
    assert_eq!(project.format, Format::Rez);
}

#[test]
fn auto_ids_follow_the_configured_floor() {
    let options = CompileOptions {
        first_auto_id: 1000,
        ..CompileOptions::default()
    };
    let project = compile_str(
        &format!("{}\ndeclare Simple {{ new (#auto) {{}}; new (#auto) {{}}; }};", SIMPLE),
        options,
    )
    .unwrap();
    let ids: Vec<i64> = project
        .get_unit("output")
        .into_iter()
        .flat_map(|unit| unit.entries())
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids, vec![1000, 1001]);
}

#[test]
fn auto_ids_stop_at_the_top_of_the_range() {
    let options = CompileOptions {
        first_auto_id: i64::MAX,
        ..CompileOptions::default()
    };
    let diag = compile_str(
        &format!("{}\ndeclare Simple {{ new (#auto) {{}}; new (#auto) {{}}; }};", SIMPLE),
        options,
    )
    .unwrap_err();
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
    assert!(diag.location.is_some());
}

#[test]
fn duplicate_type_definitions_are_rejected() {
    let diag = failure(&format!("{}{}", SIMPLE, SIMPLE));
    assert_eq!(diag.kind, ErrorKind::DuplicateDefinition);
}

#[test]
fn counter_without_list_is_malformed() {
    let diag = failure(
        r#"type Broken : "brkn" {
            template { OCNT "Count"; DWRD "Value"; };
            field("Value");
        };"#,
    );
    assert_eq!(diag.kind, ErrorKind::MalformedTemplate);
    assert_eq!(diag.code, "KDL038");
}

#[test]
fn division_by_zero_in_a_variable() {
    let diag = failure("@var broken = 1 / 0;");
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
}

#[test]
fn lexical_errors_carry_a_position() {
    let diag = failure("type Broken : \"brkn\" {\n  template { DWRD \"Value; };");
    assert_eq!(diag.kind, ErrorKind::Lexical);
    assert_eq!(diag.location.as_ref().map(|l| l.line), Some(2));
    assert!(diag.report().contains("KDL002"));
}
