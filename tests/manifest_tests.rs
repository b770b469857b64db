//! Manifest tests: TOML loading, lowering into the model and `name=value` overrides.

use std::io::Write;

use flashblock::{
    compile, parse_override, Element, Endianness, Literal, Manifest, ManifestError, Offset,
    RangeEnd, ScalarType, TypeDecl,
};

const REFERENCE: &str = r#"
name = "reference"

[[container]]
name = "flash"
at = 0x8000_0000

[[container.block]]
name = "params"
offset = "."
length = 0x200
fill = 0xAA
endianness = "LE"
header = { id = 0xFF01, major = 1, minor = 0, version = 3 }
comment = "Calibration data"

[[container.block.data]]
kind = "param"
name = "coeffs"
offset = 0x10
type = "float32[6]"
value = [1.0, -2.1, 3.2, 4.5, 5.4, 6.5]
comment = "filter coefficients"

[[container.block.data]]
kind = "param"
name = "label"
offset = "."
type = "utf8[8]"
value = "fb"

[[container.block.data]]
kind = "crc"
name = "crc"
offset = "0x1FC"
type = "uint32"
memory = { from = 0, to = "." }
"#;

#[test]
fn reference_manifest_lowers_and_compiles() {
    let decl = REFERENCE
        .parse::<Manifest>()
        .unwrap()
        .into_declaration()
        .unwrap();
    assert_eq!(decl.name, "reference");
    let container = &decl.containers[0];
    assert_eq!(container.at, 0x8000_0000);

    let block = &container.blocks[0];
    assert_eq!(block.offset, Offset::NextFree);
    assert_eq!(block.length, 0x200);
    assert_eq!(block.fill, 0xAA);
    assert_eq!(block.endianness, Endianness::Little);
    assert_eq!(block.header.unwrap().id, 0xFF01);
    assert_eq!(block.comment.as_deref(), Some("Calibration data"));

    match &block.elements[1] {
        Element::Parameter(p) => {
            assert_eq!(p.ty, TypeDecl::Utf8(Some(8)));
            assert_eq!(p.offset, Offset::NextFree);
            assert_eq!(p.value, Literal::Str("fb".into()));
        }
        other => panic!("expected parameter, got {:?}", other),
    }
    match &block.elements[2] {
        Element::Crc(c) => {
            assert_eq!(c.offset, Offset::Explicit(0x1FC));
            assert_eq!(c.ty, ScalarType::U32);
            assert_eq!(c.range.to, RangeEnd::EndOfRange);
            assert_eq!(c.range.access, 8);
            assert!(!c.range.swap);
        }
        other => panic!("expected crc, got {:?}", other),
    }

    let layout = compile(&decl).unwrap();
    assert_eq!(layout.symbol("params_label").unwrap().address, 0x8000_0028);
    assert_eq!(
        layout.symbol("params_coeffs").unwrap().comment.as_deref(),
        Some("filter coefficients")
    );
}

/// Explicit CRC parameters, including a 64-bit polynomial written as a string.
#[test]
fn crc_config_and_memory() {
    let text = r#"
[[container]]
name = "c"
at = 0

[[container.block]]
name = "b"
length = 0x20
endianness = "BE"

[[container.block.data]]
kind = "crc"
name = "crc64"
offset = 0x18
type = "uint64"
memory = { from = 0, to = 0x0F, access = 32, swap = true }
config = { polynomial = "0x42F0E1EBA9EA3693", init = "0xFFFFFFFFFFFFFFFF", rev_in = true, rev_out = true, final_xor = true }
"#;
    let decl = text.parse::<Manifest>().unwrap().into_declaration().unwrap();
    let block = &decl.containers[0].blocks[0];
    assert_eq!(block.endianness, Endianness::Big);
    match &block.elements[0] {
        Element::Crc(c) => {
            assert_eq!(c.config.polynomial, 0x42F0_E1EB_A9EA_3693);
            assert_eq!(c.config.init, u64::MAX);
            assert_eq!(c.range.to, RangeEnd::Explicit(0x0F));
            assert_eq!(c.range.access, 32);
            assert!(c.range.swap);
        }
        other => panic!("expected crc, got {:?}", other),
    }
    assert!(compile(&decl).is_ok());
}

#[test]
fn unknown_keys_are_rejected() {
    let text = r#"
[[container]]
name = "c"
at = 0
colour = "blue"
"#;
    match text.parse::<Manifest>() {
        Err(ManifestError::Toml(_)) => {}
        other => panic!("expected TOML error, got {:?}", other),
    }
}

#[test]
fn invalid_values_are_reported_with_context() {
    let text = r#"
[[container]]
name = "c"
at = 0

[[container.block]]
name = "b"
length = 0x10
fill = 0x1FF
"#;
    match text.parse::<Manifest>().unwrap().into_declaration() {
        Err(ManifestError::Invalid { context, .. }) => assert!(context.contains("fill")),
        other => panic!("expected invalid value, got {:?}", other),
    }

    let bad_type = r#"
[[container]]
name = "c"
at = 0

[[container.block]]
name = "b"
length = 0x10

[[container.block.data]]
kind = "param"
name = "p"
type = "uint24"
value = 1
"#;
    assert!(matches!(
        bad_type.parse::<Manifest>().unwrap().into_declaration(),
        Err(ManifestError::Invalid { .. })
    ));
}

#[test]
fn from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(REFERENCE.as_bytes()).unwrap();
    file.flush().unwrap();
    let manifest = Manifest::from_path(file.path()).unwrap();
    assert_eq!(manifest.containers.len(), 1);

    match Manifest::from_path("/nonexistent/flashblock.toml") {
        Err(ManifestError::Io(_)) => {}
        other => panic!("expected IO error, got {:?}", other),
    }
}

#[test]
fn override_values_parse_as_toml() {
    assert_eq!(
        parse_override("count=0x10").unwrap(),
        ("count".to_string(), Literal::Int(16))
    );
    assert_eq!(
        parse_override("params.coeffs = [1.0, 2]").unwrap(),
        (
            "params.coeffs".to_string(),
            Literal::Array(vec![Literal::Float(1.0), Literal::Int(2)])
        )
    );
    assert_eq!(
        parse_override("label=\"hi\"").unwrap().1,
        Literal::Str("hi".into())
    );
    assert_eq!(parse_override("label=hello").unwrap().1, Literal::Str("hello".into()));
    assert!(parse_override("novalue").is_err());
    assert!(parse_override("=3").is_err());
}

/// An override applied to a loaded manifest changes the compiled image.
#[test]
fn override_recompiles() {
    let mut decl = REFERENCE.parse::<Manifest>().unwrap().into_declaration().unwrap();
    let before = compile(&decl).unwrap();
    let (name, value) = parse_override("label=\"changed\"").unwrap();
    assert_eq!(decl.modify(&name, value).unwrap(), 1);
    let after = compile(&decl).unwrap();
    let crc = |l: &flashblock::Layout| {
        l.symbol_bytes(l.symbol("params_crc").unwrap()).unwrap().to_vec()
    };
    assert_ne!(crc(&before), crc(&after));
}
