//! End-to-end tests: text to bytecode and back

use rainlang_bytecode::{BytecodeReader, MemoryKind, OpMetaTable, Word};
use rainlang_compiler::*;

fn compile(text: &str) -> CompileResult<ExpressionConfig> {
    Rainlang::builtin().compile(text)
}

fn words(bytes: &[u8]) -> Vec<Word> {
    BytecodeReader::aligned(bytes)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

const DOCUMENTS: &[&str] = &[
    "_: add(1 2);",
    "a: 10, b: 20, c: mul(add(a b) sub(b a) 3), _: if(gt(c 100) c div(c 2));",
    "price: chainlink-price(0x1234 3600), _: scale-18<8 0>(price);",
    "x y: call<1 2>(5 6), : ensure(lt(x y)), _: y;",
    "a b c d e f g h: explode-32(0xff00ff), _: every(a b c);",
    "_: loop-n<1 4>(max-uint256);",
    "k: hash(1 2 3), : set(k 7), v: get(k), _: v;",
    "_: block-timestamp();\n_ _: context<0 1>() context<1 0>();",
    ";",
];

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_end_to_end_minimal_table() {
    let table = OpMetaTable::from_json_str(
        r#"[
            {"name": "read-memory", "operand": [
                {"name": "index", "bits": [1, 15]},
                {"name": "type", "bits": [0, 0]}
            ], "inputs": 0, "outputs": 1},
            {"name": "add", "operand": [{"name": "inputs", "bits": [0, 7]}],
             "inputs": {"bits": [0, 7]}, "outputs": 1}
        ]"#,
    )
    .unwrap();
    let rainlang = Rainlang::new(table, RainlangConfig::default());
    let config = rainlang.compile("_: add(1 2);").unwrap();

    assert_eq!(config.constants, vec!["1", "2"]);
    assert_eq!(
        config.sources,
        vec![vec![0, 0, 0, 1, 0, 0, 0, 3, 0, 1, 0, 2]]
    );
}

#[test]
fn test_round_trip() {
    let rainlang = Rainlang::builtin();
    for text in DOCUMENTS {
        let first = rainlang
            .compile(text)
            .unwrap_or_else(|e| panic!("{}: {}", text, e));
        let decompiled = rainlang.decompile(&first).unwrap();
        let second = rainlang
            .compile(&decompiled)
            .unwrap_or_else(|e| panic!("{} -> {}: {}", text, decompiled, e));

        assert_eq!(first.sources, second.sources, "{} -> {}", text, decompiled);
        assert_eq!(first.constants, second.constants, "{} -> {}", text, decompiled);
    }
}

#[test]
fn test_determinism() {
    for text in DOCUMENTS {
        assert_eq!(compile(text).unwrap(), compile(text).unwrap());
    }
}

#[test]
fn test_constant_dedup() {
    let config = compile("_ _: add(1 2) sub(1 2);").unwrap();
    assert_eq!(config.constants, vec!["1", "2"]);

    for text in DOCUMENTS {
        let config = compile(text).unwrap();
        let mut constants = config.constants.clone();
        constants.sort();
        constants.dedup();
        assert_eq!(constants.len(), config.constants.len(), "{}", text);
    }
}

#[test]
fn test_single_name_for_two_values_is_unbalanced() {
    match compile("_: add(1 2) sub(1 2);") {
        Err(CompileError::Diagnostics(problems)) => {
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].code, ErrorCode::MismatchLHS);
        }
        other => panic!("expected diagnostics, got {:?}", other),
    }
}

#[test]
fn test_arity_invariant() {
    match compile("_: add();") {
        Err(CompileError::Diagnostics(problems)) => {
            assert_eq!(problems[0].code, ErrorCode::OutOfRangeInputs);
        }
        other => panic!("expected diagnostics, got {:?}", other),
    }
}

#[test]
fn test_balance() {
    assert!(compile("_: add(1 2);").is_ok());
    match compile("a b: add(1 2);") {
        Err(CompileError::Diagnostics(problems)) => {
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].code, ErrorCode::MismatchRHS);
        }
        other => panic!("expected diagnostics, got {:?}", other),
    }
}

#[test]
fn test_formula_operand_round_trip() {
    let rainlang = Rainlang::builtin();
    for loops in 1..=15 {
        let text = format!("_: loop-n<1 {}>(1);", loops);
        let config = rainlang.compile(&text).unwrap();
        let word = words(&config.sources[0])[1];
        assert_eq!(word.operand >> 12, loops - 1);

        let plain = Decompiler::new(rainlang.table()).decompile(&config).unwrap();
        assert_eq!(plain, text);
    }
}

#[test]
fn test_explicit_memory_reads_round_trip() {
    let rainlang = Rainlang::builtin();
    let text = "a: 4, _ _: read-memory<0 1>() read-memory<0 0>();";
    let first = rainlang.compile(text).unwrap();
    let second = rainlang
        .compile(&rainlang.decompile(&first).unwrap())
        .unwrap();
    assert_eq!(first, second);

    for text in ["_: read-memory<5 1>();", "_: read-memory<0 0>();"] {
        assert!(
            matches!(
                rainlang.compile(text),
                Err(CompileError::InvalidMemoryRead { .. })
            ),
            "{}",
            text
        );
    }
    assert!(matches!(
        rainlang.compile("a: 4, _: read-memory<1 1>();"),
        Err(CompileError::InvalidMemoryRead {
            kind: MemoryKind::Constant,
            index: 1,
            ..
        })
    ));
}

#[test]
fn test_formula_operand_without_valid_range() {
    let table = OpMetaTable::from_json_str(
        r#"[
            {"name": "read-memory", "operand": [
                {"name": "index", "bits": [1, 15]},
                {"name": "type", "bits": [0, 0]}
            ], "inputs": 0, "outputs": 1},
            {"name": "rep", "operand": [
                {"name": "times", "bits": [0, 3], "computation": "arg - 1"}
            ], "inputs": 0, "outputs": 1}
        ]"#,
    )
    .unwrap();
    let rainlang = Rainlang::new(table, RainlangConfig::default());

    match rainlang.compile("_: rep<16>();") {
        Err(CompileError::Diagnostics(problems)) => {
            assert_eq!(problems[0].code, ErrorCode::OutOfRangeOperandArgs);
        }
        other => panic!("expected diagnostics, got {:?}", other),
    }

    let config = rainlang.compile("_: rep<15>();").unwrap();
    assert_eq!(words(&config.sources[0]), vec![Word::new(1, 14)]);
    let plain = Decompiler::new(rainlang.table()).decompile(&config).unwrap();
    assert_eq!(plain, "_: rep<15>();");
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_expression_config_json() {
    let config = compile("_: add(1 2);").unwrap();
    let json = config.to_json().unwrap();
    assert!(json.contains("\"0x000000010000000300010002\""));
    assert_eq!(ExpressionConfig::from_json(&json).unwrap(), config);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["constants"], serde_json::json!(["1", "2"]));
}

#[test]
fn test_decompile_hex_constants() {
    let config = ExpressionConfig::new(
        vec![vec![0, 0, 0, 1]],
        vec!["0x10".to_string()],
    );
    let text = Decompiler::new(OpMetaTable::builtin())
        .decompile(&config)
        .unwrap();
    assert_eq!(text, "_: 16;");
}

#[test]
fn test_pretty_output_reparses() {
    let rainlang = Rainlang::builtin();
    let text = "a: 10, b: 20, _: mul(add(a b) scale-18<8 0>(b));";
    let config = rainlang.compile(text).unwrap();
    let pretty = rainlang.decompile(&config).unwrap();
    assert!(pretty.contains("\n    "));
    assert_eq!(rainlang.compile(&pretty).unwrap(), config);
}
