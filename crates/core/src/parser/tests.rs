use crate::compile::compile_str;
use crate::config::{CompileOptions, Format};
use crate::diagnostic::{code, ErrorKind};
use crate::project::{Instance, Project};
use crate::value::ValueContainer;

fn compile(source: &str) -> Project {
    match compile_str(source, CompileOptions::default()) {
        Ok(project) => project,
        Err(diag) => panic!("compilation failed:\n{}", diag.report()),
    }
}

fn error(source: &str) -> crate::diagnostic::Diagnostic {
    compile_str(source, CompileOptions::default()).expect_err("compilation should fail")
}

fn instance<'a>(project: &'a Project, namespace: &str, code: &str, id: i64) -> &'a Instance {
    let code = crate::types::TypeCode::parse(code).expect("valid code");
    project
        .get_unit("output")
        .and_then(|unit| unit.get(namespace))
        .and_then(|ns| ns.get(code))
        .and_then(|container| container.instance(id))
        .expect("instance exists")
}

const SPRITE: &str = r#"
type Sprite : "spri" {
    template {
        DWRD "Width";
        DWRD "Height";
        PSTR "Name";
        DBYT "Mode";
    };
    field("Size") {
        Width = 16;
        Height = 16;
    };
    field("Name");
    field("Mode") {
        Mode = Normal [Normal = 0, Masked = 1, Inverted = 2];
    };
    constructor(side) {
        Width = side;
        Height = side * 2;
    };
};
"#;

#[test]
fn metadata_directives_fill_project_metadata() {
    let project = compile(
        r#"
        @project "Kestrel";
        @author "A. Writer";
        @author "B. Writer";
        @version "1.2";
        @license "MIT";
        "#,
    );
    assert_eq!(project.metadata.name.as_deref(), Some("Kestrel"));
    assert_eq!(project.metadata.authors, vec!["A. Writer", "B. Writer"]);
    assert_eq!(project.metadata.version.as_deref(), Some("1.2"));
    assert_eq!(project.metadata.license.as_deref(), Some("MIT"));
}

#[test]
fn format_set_then_requires() {
    let project = compile("@format set extended;\n@format requires extended;");
    assert_eq!(project.format, Format::Extended);

    let diag = error("@format requires rez;");
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
    assert_eq!(diag.code, code::ILLEGAL_VALUE);

    let diag = error("@format set bogus;");
    assert_eq!(diag.code, code::BAD_VALUE);
}

#[test]
fn type_definition_is_registered_with_fields() {
    let project = compile(SPRITE);
    let sprite = project.types.get("Sprite").expect("registered");
    assert_eq!(sprite.code.to_string(), "spri");
    assert_eq!(sprite.fields.len(), 3);
    assert_eq!(sprite.constructors.len(), 1);
    assert_eq!(sprite.default_for("Width"), Some(&ValueContainer::Integer(16)));
    assert_eq!(sprite.default_for("Mode"), Some(&ValueContainer::Integer(0)));
}

const TILE: &str = r#"
type Tile : "tile" {
    template {
        DWRD "Width";
        DWRD "Height";
        DWRD "Depth";
        PSTR "Name";
        DBYT "Mode";
    };
    field("Width") { Width = 16; };
    field("Height") { Height = 16; };
    field("Depth") { Depth = 7; };
    field("Name");
    field("Mode") {
        Mode = Normal [Normal = 0, Masked = 1];
    };
    constructor(side) {
        Width = side;
        Height = side * 2;
    };
};
"#;

#[test]
fn declaration_merges_defaults_constructor_and_explicit_values() {
    let project = compile(&format!(
        r#"{}
        declare Tile {{
            new (#128, "Floor") {{
                Height = 3;
                Tile(8);
                Mode = Masked;
                Name = "ship";
            }};
        }};
        "#,
        TILE
    ));
    let floor = instance(&project, "", "tile", 128);
    assert_eq!(floor.name, "Floor");
    assert_eq!(floor.value("Width"), Some(&ValueContainer::Integer(8)));
    assert_eq!(floor.value("Height"), Some(&ValueContainer::Integer(3)));
    assert_eq!(floor.value("Mode"), Some(&ValueContainer::Integer(1)));
    assert_eq!(
        floor.data,
        vec![0, 8, 0, 3, 0, 7, 4, b's', b'h', b'i', b'p', 1],
    );
}

#[test]
fn multi_value_field_takes_values_in_order() {
    let project = compile(&format!(
        r#"{}
        declare Sprite {{
            new (#128) {{
                Sprite(8);
                Size = 5, 3;
            }};
        }};
        "#,
        SPRITE
    ));
    let sprite = instance(&project, "", "spri", 128);
    assert_eq!(sprite.value("Width"), Some(&ValueContainer::Integer(5)));
    assert_eq!(sprite.value("Height"), Some(&ValueContainer::Integer(3)));
    assert_eq!(sprite.data, vec![0, 5, 0, 3, 0, 0]);
}

#[test]
fn bare_format_name_sets_the_format() {
    let project = compile("@format rez;");
    assert_eq!(project.format, Format::Rez);

    let diag = error("@format requires;");
    assert_eq!(diag.kind, ErrorKind::UnexpectedLexeme);
}

#[test]
fn unquoted_field_name_is_explained() {
    let diag = error(
        r#"
        type Bad : "bad " {
            template { DWRD "Width"; };
            field(Width);
        };
        "#,
    );
    assert_eq!(diag.kind, ErrorKind::UnexpectedLexeme);
    assert_eq!(diag.location.as_ref().map(|l| l.line), Some(4));
    assert!(diag.info.iter().any(|line| line.contains("quoted")));
}

#[test]
fn variables_are_visible_in_values() {
    let project = compile(&format!(
        r#"@var base = 10;
        {}
        declare Sprite {{ new (#128) {{ Size = $base, $base * 3; }}; }};
        "#,
        SPRITE
    ));
    let sprite = instance(&project, "", "spri", 128);
    assert_eq!(sprite.value("Width"), Some(&ValueContainer::Integer(10)));
    assert_eq!(sprite.value("Height"), Some(&ValueContainer::Integer(30)));
}

#[test]
fn auto_ids_start_at_the_configured_floor() {
    let project = compile(&format!(
        r#"{}
        declare Sprite {{
            new (#auto) {{}};
            new (#129) {{}};
            new (#auto) {{}};
        }};
        "#,
        SPRITE
    ));
    let code = crate::types::TypeCode::parse("spri").expect("valid code");
    let ids: Vec<i64> = project
        .get_unit("output")
        .and_then(|unit| unit.get(""))
        .and_then(|ns| ns.get(code))
        .map(|container| container.instances().map(Instance::id).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![128, 129, 130]);
}

#[test]
fn override_and_duplicate_start_from_existing_values() {
    let project = compile(&format!(
        r#"{}
        declare Game.Sprite {{
            new (#200, "Base") {{ Size = 4, 5; Name = "base"; }};
            override (#200) {{ Name = "changed"; }};
            duplicate (#200 as #201, "Copy") {{ Mode = Inverted; }};
        }};
        "#,
        SPRITE
    ));
    let base = instance(&project, "Game", "spri", 200);
    assert_eq!(base.value("Width"), Some(&ValueContainer::Integer(4)));
    assert_eq!(base.value("Name"), Some(&ValueContainer::String("changed".into())));

    let copy = instance(&project, "Game", "spri", 201);
    assert_eq!(copy.name, "Copy");
    assert_eq!(copy.reference.container.as_deref(), Some("Game"));
    assert_eq!(copy.value("Height"), Some(&ValueContainer::Integer(5)));
    assert_eq!(copy.value("Mode"), Some(&ValueContainer::Integer(2)));
}

#[test]
fn duplicate_resource_ids_are_rejected() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ new (#128) {{}}; new (#128) {{}}; }};",
        SPRITE
    ));
    assert_eq!(diag.kind, ErrorKind::DuplicateResource);
    assert!(diag.location.is_some());
}

#[test]
fn override_of_missing_resource_fails() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ override (#5) {{}}; }};",
        SPRITE
    ));
    assert_eq!(diag.kind, ErrorKind::UnresolvedSymbol);
}

#[test]
fn unknown_field_and_type_are_reported() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ new (#1) {{ Colour = 3; }}; }};",
        SPRITE
    ));
    assert_eq!(diag.kind, ErrorKind::UnresolvedSymbol);
    assert_eq!(diag.code, code::UNKNOWN_FIELD);

    let diag = error("declare Nothing { new (#1) {}; };");
    assert_eq!(diag.code, code::UNRECOGNIZED_TYPE);
}

#[test]
fn unknown_symbol_is_reported() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ new (#1) {{ Mode = Sideways; }}; }};",
        SPRITE
    ));
    assert_eq!(diag.code, code::UNRECOGNIZED_SYMBOL);
}

#[test]
fn too_many_values_for_a_field() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ new (#1) {{ Name = \"a\", \"b\"; }}; }};",
        SPRITE
    ));
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
}

#[test]
fn out_of_range_value_is_rejected() {
    let diag = error(&format!(
        "{}\ndeclare Sprite {{ new (#1) {{ Mode = 300; }}; }};",
        SPRITE
    ));
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
    assert_eq!(diag.code, code::ILLEGAL_VALUE);
}

const ROSTER: &str = r#"
type Roster : "rost" {
    template {
        OCNT "Count";
        LSTC "Start";
        DWRD "Member";
        LSTE "End";
    };
    field("Member") repeatable<1, 3>;
};
"#;

#[test]
fn repeatable_fields_append_entries_and_set_the_count() {
    let project = compile(&format!(
        "{}\ndeclare Roster {{ new (#1) {{ Member = 7; Member = 9; }}; }};",
        ROSTER
    ));
    let roster = instance(&project, "", "rost", 1);
    assert_eq!(roster.value("Count"), Some(&ValueContainer::Integer(2)));
    assert_eq!(roster.value("Member[0]"), Some(&ValueContainer::Integer(7)));
    assert_eq!(roster.value("Member[1]"), Some(&ValueContainer::Integer(9)));
    assert_eq!(roster.data, vec![0, 2, 0, 7, 0, 9]);
}

#[test]
fn repeat_bounds_are_enforced() {
    let diag = error(&format!(
        "{}\ndeclare Roster {{ new (#1) {{}}; }};",
        ROSTER
    ));
    assert_eq!(diag.kind, ErrorKind::InvalidValue);

    let diag = error(&format!(
        "{}\ndeclare Roster {{ new (#1) {{ Member = 1; Member = 2; Member = 3; Member = 4; }}; }};",
        ROSTER
    ));
    assert_eq!(diag.kind, ErrorKind::InvalidValue);
}

#[test]
fn list_member_needs_a_repeatable_field() {
    let diag = error(
        r#"type Bad : "badd" {
            template { OCNT "N"; LSTC "S"; DWRD "Item"; LSTE "E"; };
            field("Item");
        };"#,
    );
    assert_eq!(diag.kind, ErrorKind::MalformedTemplate);
}

#[test]
fn duplicate_symbols_are_rejected() {
    let diag = error(
        r#"type Flag : "flag" {
            template { DBYT "On"; };
            field("On") { On [Yes = 1, Yes = 0]; };
        };"#,
    );
    assert_eq!(diag.kind, ErrorKind::DuplicateDefinition);
}

#[test]
fn unexpected_top_level_item() {
    let diag = error("resource Sprite;");
    assert_eq!(diag.kind, ErrorKind::UnexpectedLexeme);
    assert_eq!(diag.code, code::UNEXPECTED_TOKEN);
}

#[test]
fn out_directive_switches_unit() {
    let project = compile(&format!(
        "{}\n@out \"extra.ndat\";\ndeclare Sprite {{ new (#1) {{}}; }};",
        SPRITE
    ));
    assert!(project.get_unit("output").is_none());
    assert_eq!(
        project.get_unit("extra.ndat").map(|unit| unit.resource_count()),
        Some(1)
    );
}

#[test]
fn deprecated_types_still_compile() {
    let project = compile(
        r#"@deprecated("use Sprite")
        type Old : "oldd" { template { DBYT "B"; }; field("B"); };
        declare Old { new (#1) { B = 2; }; };"#,
    );
    assert_eq!(instance(&project, "", "oldd", 1).data, vec![2]);
}
