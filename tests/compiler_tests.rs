//! End-to-end compiler tests
//! Demonstrates: AST → Compiler → Program → Machine working together

use bonsai::ast::{CompareOp, Condition, Declaration, Expression, Operand, Program, Statement};
use bonsai::compiler::{AddressBase, Instruction};
use bonsai::{compile, CompileOptions, Compiler, Error, ErrorOrigin, Machine};

fn decls(vars: &[(&str, u64)]) -> Vec<Declaration> {
    vars.iter()
        .enumerate()
        .map(|(i, (name, value))| Declaration::new(*name, *value).at_line(i + 1))
        .collect()
}

fn lit(value: u64) -> Operand {
    Operand::lit(value)
}

fn var(name: &str) -> Operand {
    Operand::var(name)
}

fn assert_single_trailing_halt(program: &bonsai::compiler::Program) {
    let halts = program
        .instructions()
        .iter()
        .filter(|i| **i == Instruction::Hlt)
        .count();
    assert_eq!(halts, 1);
    assert_eq!(program.instructions().last(), Some(&Instruction::Hlt));
}

#[test]
fn test_subtraction_scenario() {
    let ast = Program::new(
        decls(&[("a", 3), ("b", 2), ("c", 0)]),
        vec![Statement::assign("c", Expression::sub(var("a"), var("b")))],
    );
    let program = compile(&ast).unwrap();
    assert_single_trailing_halt(&program);

    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("c"), Some(1));
    assert_eq!(exec.value("a"), Some(3));
    assert_eq!(exec.value("b"), Some(2));
    assert!(exec.scratch_values().iter().all(|v| *v == 0));
}

#[test]
fn test_counted_loop_scenario() {
    let ast = Program::new(
        decls(&[("n", 4), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::assign("s", Expression::add(var("s"), Operand::lit(1)))],
        )],
    );
    let program = compile(&ast).unwrap();
    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("s"), Some(4));
    assert_eq!(exec.value("n"), Some(4));
    assert_eq!(exec.value("i"), None);
}

#[test]
fn test_if_else_scenario() {
    let ast = Program::new(
        decls(&[("x", 0), ("y", 0)]),
        vec![Statement::if_else(
            Condition::is_zero("x"),
            vec![Statement::assign("y", Operand::lit(1).into())],
            vec![Statement::assign("y", Operand::lit(2).into())],
        )],
    );
    let program = compile(&ast).unwrap();
    let machine = Machine::new();
    assert_eq!(machine.run(&program).unwrap().value("y"), Some(1));
    assert_eq!(
        machine.run_with(&program, &[("x", 5)]).unwrap().value("y"),
        Some(2)
    );
}

#[test]
fn test_loop_binding_counts_up() {
    // for i in range(n): s = s + i
    let ast = Program::new(
        decls(&[("n", 4), ("i", 9), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::assign("s", Expression::add(var("s"), var("i")))],
        )],
    );
    let program = compile(&ast).unwrap();
    let machine = Machine::new();

    let exec = machine.run(&program).unwrap();
    assert_eq!(exec.value("s"), Some(6)); // 0 + 1 + 2 + 3
    assert_eq!(exec.value("i"), Some(3));

    // empty range leaves the binding alone
    let exec = machine.run_with(&program, &[("n", 0)]).unwrap();
    assert_eq!(exec.value("s"), Some(0));
    assert_eq!(exec.value("i"), Some(9));
}

#[test]
fn test_nested_loops() {
    let ast = Program::new(
        decls(&[("n", 3), ("m", 2), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::for_range(
                "j",
                var("m"),
                vec![Statement::assign("s", Expression::add(var("s"), Operand::lit(1)))],
            )],
        )],
    );
    let program = compile(&ast).unwrap();
    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("s"), Some(6));
    assert_eq!((exec.value("n"), exec.value("m")), (Some(3), Some(2)));
    assert!(exec.scratch_values().iter().all(|v| *v == 0));
}

#[test]
fn test_loop_bound_changed_in_body_keeps_trip_count() {
    let ast = Program::new(
        decls(&[("n", 3), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![
                Statement::assign("n", Expression::add(var("n"), Operand::lit(1))),
                Statement::assign("s", Expression::add(var("s"), Operand::lit(1))),
            ],
        )],
    );
    let exec_program = compile(&ast).unwrap();
    let exec = Machine::new().run(&exec_program).unwrap();
    assert_eq!(exec.value("s"), Some(3));
    assert_eq!(exec.value("n"), Some(6));
}

#[test]
fn test_aliased_assignments() {
    let ast = Program::new(
        decls(&[("a", 3), ("b", 5)]),
        vec![
            Statement::assign("a", Expression::add(var("a"), var("a"))),
            Statement::assign("b", Expression::sub(var("a"), var("b"))),
            Statement::assign("a", Expression::sub(var("b"), var("a"))),
        ],
    );
    let program = compile(&ast).unwrap();
    let exec = Machine::new().run(&program).unwrap();
    // a = 6, b = 6 - 5 = 1, a = max(1 - 6, 0) = 0
    assert_eq!(exec.value("a"), Some(0));
    assert_eq!(exec.value("b"), Some(1));
}

#[test]
fn test_constant_folding() {
    let ast = Program::new(
        decls(&[("x", 8), ("y", 8)]),
        vec![
            Statement::assign("x", Expression::add(Operand::lit(2), Operand::lit(3))),
            Statement::assign("y", Expression::sub(Operand::lit(2), Operand::lit(5))),
        ],
    );
    let program = compile(&ast).unwrap();
    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("x"), Some(5));
    assert_eq!(exec.value("y"), Some(0));
}

#[test]
fn test_listing_golden() {
    let ast = Program::new(
        decls(&[("x", 0)]),
        vec![Statement::assign("x", Operand::lit(1).into())],
    );
    let program = compile(&ast).unwrap();
    assert_eq!(program.to_string(), "TST 1, 2, 4\nDEC 1\nJMP 1\nINC 1\nHLT\n");

    let ast = Program::new(
        decls(&[("x", 0)]),
        vec![Statement::assign("x", Expression::add(var("x"), Operand::lit(1)))],
    );
    assert_eq!(compile(&ast).unwrap().to_string(), "INC 1\nHLT\n");
}

#[test]
fn test_zero_based_addresses() {
    let ast = Program::new(
        decls(&[("a", 2), ("b", 0)]),
        vec![Statement::assign("b", var("a").into())],
    );
    let compiler = Compiler::new(CompileOptions {
        address_base: AddressBase::Zero,
        ..CompileOptions::default()
    });
    let program = compiler.compile(&ast).unwrap();
    assert_eq!(program.address_base(), AddressBase::Zero);
    assert_eq!(program.instructions()[0].mnemonic(), "TST");
    match program.instructions()[0] {
        Instruction::Tst { if_nonzero, .. } => assert_eq!(if_nonzero, 1),
        other => panic!("unexpected {}", other),
    }

    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("b"), Some(2));
}

#[test]
fn test_compile_json() {
    let json = r#"{
        "declarations": [
            {"name": "a", "value": 3, "line": 1},
            {"name": "b", "value": 0, "line": 2}
        ],
        "body": [{
            "kind": {"If": {
                "condition": {"lhs": {"Variable": "a"}, "op": "Gt", "rhs": {"Literal": 0}},
                "then_branch": [{
                    "kind": {"Assign": {"target": "b", "value": {"Operand": {"Variable": "a"}}}},
                    "line": 4
                }],
                "else_branch": []
            }},
            "line": 3
        }]
    }"#;
    let program = Compiler::default().compile_json(json).unwrap();
    let exec = Machine::new().run(&program).unwrap();
    assert_eq!(exec.value("b"), Some(3));

    let err = Compiler::default().compile_json("{not json").unwrap_err();
    assert!(matches!(err, Error::InvalidAst(_)));
    assert_eq!(err.classify(), ErrorOrigin::Configuration);
}

// =============================================================================
// ERROR KINDS
// =============================================================================

#[test]
fn test_unknown_variable() {
    let ast = Program::new(
        decls(&[("a", 1)]),
        vec![Statement::assign("a", Expression::add(var("a"), var("ghost"))).at_line(2)],
    );
    assert_eq!(
        compile(&ast).unwrap_err(),
        Error::UnknownVariable {
            name: "ghost".into(),
            line: 2
        }
    );
}

#[test]
fn test_undeclared_loop_binding_is_not_materialized() {
    let ast = Program::new(
        decls(&[("n", 2), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::assign("s", Expression::add(var("s"), var("i"))).at_line(2)],
        )],
    );
    assert!(matches!(
        compile(&ast),
        Err(Error::UnknownVariable { ref name, line: 2 }) if name == "i"
    ));
}

#[test]
fn test_duplicate_variable() {
    let ast = Program::new(decls(&[("a", 1), ("a", 2)]), vec![]);
    assert_eq!(
        compile(&ast).unwrap_err(),
        Error::DuplicateVariable {
            name: "a".into(),
            line: 2
        }
    );
}

#[test]
fn test_unsupported_constructs() {
    let cases = vec![
        // comparison that is always false on unsigned registers
        Statement::if_else(
            Condition::new(var("x"), CompareOp::Lt, Operand::lit(0)),
            vec![],
            vec![],
        ),
        // comparison against anything but zero
        Statement::if_else(
            Condition::new(var("x"), CompareOp::Eq, var("n")),
            vec![],
            vec![],
        ),
        // range over a literal
        Statement::for_range("i", Operand::lit(5), vec![]),
        // assignment to the loop binding
        Statement::for_range(
            "x",
            var("n"),
            vec![Statement::assign("x", Operand::lit(0).into()).at_line(5)],
        ),
        // nested loop reusing the binding
        Statement::for_range(
            "x",
            var("n"),
            vec![Statement::for_range("x", var("n"), vec![]).at_line(5)],
        ),
    ];

    for stmt in cases {
        let ast = Program::new(decls(&[("x", 0), ("n", 1)]), vec![stmt.clone().at_line(5)]);
        let err = compile(&ast).unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedConstruct { line: 5, .. }),
            "{:?} -> {:?}",
            stmt,
            err
        );
        assert_eq!(err.classify(), ErrorOrigin::Source);
    }
}

#[test]
fn test_allocation_exhausted() {
    // a = b needs one scratch register beyond the two named ones
    let ast = Program::new(
        decls(&[("a", 0), ("b", 1)]),
        vec![Statement::assign("a", var("b").into()).at_line(4)],
    );
    let compiler = Compiler::new(CompileOptions {
        register_pool: 2,
        ..CompileOptions::default()
    });
    let err = compiler.compile(&ast).unwrap_err();
    assert_eq!(
        err,
        Error::AllocationExhausted {
            requested: 3,
            pool: 2,
            line: Some(4),
        }
    );
    assert_eq!(err.line(), Some(4));

    // the third declaration is the one that does not fit
    let ast = Program::new(decls(&[("a", 0), ("b", 0), ("c", 0)]), vec![]);
    assert_eq!(compiler.compile(&ast).unwrap_err().line(), Some(3));
}

#[test]
fn test_nested_scratch_exhaustion_names_innermost_statement() {
    let ast = Program::new(
        decls(&[("n", 1), ("a", 0), ("b", 2)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::assign("a", Expression::sub(var("b"), var("a"))).at_line(8)],
        )
        .at_line(7)],
    );
    // the loop header needs two scratch registers, the body three more
    // on top of the live counter
    let compiler = Compiler::new(CompileOptions {
        register_pool: 6,
        ..CompileOptions::default()
    });
    let err = compiler.compile(&ast).unwrap_err();
    assert_eq!(
        err,
        Error::AllocationExhausted {
            requested: 7,
            pool: 6,
            line: Some(8),
        }
    );
    assert_eq!(err.line(), Some(8));
}

#[test]
fn test_invalid_options_rejected_at_compile() {
    let compiler = Compiler::new(CompileOptions {
        opt_level: 7,
        ..CompileOptions::default()
    });
    assert!(matches!(
        compiler.compile(&Program::default()),
        Err(Error::InvalidOptions(_))
    ));
}

#[test]
fn test_instruction_limit() {
    let ast = Program::new(
        decls(&[("a", 0), ("b", 0)]),
        vec![Statement::assign("a", var("b").into()).at_line(3)],
    );
    let compiler = Compiler::new(CompileOptions {
        max_instructions: Some(4),
        ..CompileOptions::default()
    });
    let err = compiler.compile(&ast).unwrap_err();
    assert_eq!(err, Error::ProgramTooLarge { limit: 4, line: 3 });
    assert_eq!(err.classify(), ErrorOrigin::Source);
}

#[test]
fn test_instruction_limit_fails_before_expanding_everything() {
    // each statement is 500 INCs; only one fits under a limit of 1000
    let body: Vec<_> = (0..50)
        .map(|i| Statement::assign("x", Expression::add(var("x"), lit(500))).at_line(i + 1))
        .collect();
    let ast = Program::new(decls(&[("x", 0)]), body);
    let compiler = Compiler::new(CompileOptions {
        max_instructions: Some(1000),
        ..CompileOptions::default()
    });

    let err = compiler.compile(&ast).unwrap_err();
    assert_eq!(err, Error::ProgramTooLarge { limit: 1000, line: 2 });
    assert_eq!(err.classify(), ErrorOrigin::Source);
    assert_eq!(err.line(), Some(2));

    let ast = Program::new(
        decls(&[("x", 0)]),
        vec![Statement::assign("x", Expression::add(var("x"), lit(u64::MAX))).at_line(1)],
    );
    assert_eq!(
        compiler.compile(&ast),
        Err(Error::ProgramTooLarge { limit: 1000, line: 1 })
    );
}

#[test]
fn test_compile_result_stats() {
    let ast = Program::new(
        decls(&[("n", 2), ("s", 0)]),
        vec![Statement::for_range(
            "i",
            var("n"),
            vec![Statement::assign("s", Expression::add(var("s"), var("n")))],
        )],
    );
    let result = Compiler::default().compile_with_stats(&ast).unwrap();
    assert_eq!(result.stats.instruction_count, result.program.len());
    assert_eq!(result.stats.register_count, result.program.register_count());
    assert!(result.stats.test_count > 0);
    assert_eq!(
        result.lowered_instruction_count - result.optimized_away,
        result.program.len() - 1
    );

    let exec = Machine::new().run(&result.program).unwrap();
    assert_eq!(exec.value("s"), Some(4));
}
