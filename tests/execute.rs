use std::rc::Rc;

use tagvm::{assemble, execute, Fault, FaultKind, Instr, PoolEntry, Value};
use tagvm::{DataRecord, Vm};

fn run(instrs: &[Instr], pool: &[PoolEntry]) -> Result<Value, Fault> {
    let program = assemble(instrs).expect("program assembles");
    execute(&program, pool)
}

// --- Loads and register moves ---

#[test]
fn loads_a_number_into_a_register() {
    let result = run(&[Instr::LoadI { dst: 0, imm: 55 }, Instr::Halt], &[]).unwrap();
    assert_eq!(result, Value::Number(55));
}

#[test]
fn loads_a_symbol_into_a_register() {
    let result = run(&[Instr::LoadS { dst: 0, imm: 12 }, Instr::Halt], &[]).unwrap();
    assert_eq!(result, Value::Symbol(12));
}

#[test]
fn loads_a_constant() {
    let pool = [PoolEntry::symbol(33)];
    let result = run(&[Instr::LoadC { dst: 0, imm: 0 }, Instr::Halt], &pool).unwrap();
    assert_eq!(result, Value::Symbol(33));
}

#[test]
fn loads_a_data_symbol() {
    // No record lives at index 1, so the load produces the scalar form.
    let result = run(&[Instr::LoadSd { dst: 0, imm: 1 }, Instr::Halt], &[]).unwrap();
    assert_eq!(result, Value::DataSymbol(1));
}

#[test]
fn loads_a_compound_data_symbol() {
    let pool = [
        PoolEntry::DataHeader { tag: 4, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::symbol(7),
    ];
    let result = run(&[Instr::LoadSd { dst: 0, imm: 0 }, Instr::Halt], &pool).unwrap();
    assert_eq!(
        result,
        Value::Data(Rc::new(DataRecord {
            tag: 4,
            fields: vec![Value::Number(55), Value::Symbol(7)],
        }))
    );
}

#[test]
fn moves_a_register() {
    let result = run(
        &[
            Instr::LoadI { dst: 2, imm: 37 },
            Instr::Move { dst: 0, src: 2 },
            Instr::Halt,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(37));
}

// --- Arithmetic ---

#[test]
fn adds_two_numbers() {
    let result = run(
        &[
            Instr::LoadI { dst: 1, imm: 5 },
            Instr::LoadI { dst: 2, imm: 32 },
            Instr::Add { dst: 0, lhs: 1, rhs: 2 },
            Instr::Halt,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(37));
}

#[test]
fn subtracts_two_numbers() {
    let result = run(
        &[
            Instr::LoadI { dst: 1, imm: 50 },
            Instr::LoadI { dst: 2, imm: 8 },
            Instr::Sub { dst: 0, lhs: 1, rhs: 2 },
            Instr::Halt,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(42));
}

// --- Calls and closures ---

#[test]
fn directly_calls_a_function() {
    let fun_address = 6;
    let result = run(
        &[
            Instr::LoadI { dst: 1, imm: 15 },
            Instr::LoadI { dst: 2, imm: 23 },
            Instr::Add { dst: 4, lhs: 1, rhs: 2 },
            Instr::LoadI { dst: 3, imm: fun_address },
            // Result register, register with the function address, argc.
            Instr::Call { dst: 0, base: 3, argc: 1 },
            Instr::Halt,
            Instr::LoadI { dst: 2, imm: 100 },
            Instr::Add { dst: 0, lhs: 1, rhs: 2 },
            Instr::Ret,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(138));
}

#[test]
fn calls_a_closure_downwards() {
    let fun_address1 = 6;
    let fun_address2 = 11;
    let result = run(
        &[
            Instr::LoadI { dst: 2, imm: fun_address2 },
            Instr::LoadI { dst: 3, imm: 80 },
            Instr::MakeCl { dst: 2, base: 2, capc: 1 },
            Instr::LoadI { dst: 1, imm: fun_address1 },
            // Call fun1 with a closure over fun2 as its argument.
            Instr::Call { dst: 0, base: 1, argc: 1 },
            Instr::Halt,
            // fun1
            Instr::LoadI { dst: 2, imm: 115 },
            Instr::LoadI { dst: 3, imm: 23 },
            Instr::Add { dst: 2, lhs: 2, rhs: 3 },
            Instr::CallCl { dst: 0, base: 1, argc: 1 },
            Instr::Ret,
            // fun2: r1 holds the argument, r2 the single captured value.
            Instr::Sub { dst: 0, lhs: 1, rhs: 2 },
            Instr::Ret,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(58)); // 115 + 23 - 80
}

#[test]
fn calls_a_closure_upwards() {
    let fun_address1 = 5;
    let fun_address2 = 9;
    let result = run(
        &[
            Instr::LoadI { dst: 1, imm: fun_address1 },
            Instr::Call { dst: 1, base: 1, argc: 1 },
            Instr::LoadI { dst: 2, imm: 80 },
            // The closure outlives the frame that built it.
            Instr::CallCl { dst: 0, base: 1, argc: 1 },
            Instr::Halt,
            // fun1
            Instr::LoadI { dst: 1, imm: fun_address2 },
            Instr::LoadI { dst: 2, imm: 24 },
            Instr::MakeCl { dst: 0, base: 1, capc: 1 },
            Instr::Ret,
            // fun2
            Instr::Sub { dst: 0, lhs: 1, rhs: 2 },
            Instr::Ret,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(56)); // 80 - 24
}

#[test]
fn callee_registers_start_fresh() {
    // The callee writes r5 without the caller ever touching it; the caller's
    // r5 is untouched after the call.
    let result = run(
        &[
            Instr::LoadI { dst: 5, imm: 1 },
            Instr::LoadI { dst: 1, imm: 5 },
            Instr::Call { dst: 2, base: 1, argc: 0 },
            Instr::Move { dst: 0, src: 5 },
            Instr::Halt,
            Instr::LoadI { dst: 5, imm: 99 },
            Instr::Move { dst: 0, src: 5 },
            Instr::Ret,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(1));
}

// --- Jumps ---

#[test]
fn jumps_forward() {
    let result = run(
        &[
            Instr::LoadI { dst: 0, imm: 66 },
            Instr::Jmp { offset: 1 },
            Instr::Halt,
            Instr::LoadI { dst: 0, imm: 70 },
            Instr::Halt,
        ],
        &[],
    )
    .unwrap();
    assert_eq!(result, Value::Number(70));
}

// --- Pattern-match dispatch ---

/// The canonical dispatch shape: `MATCH` followed by one jump slot per case.
fn match_program(load_subject: Instr, bind_base: u8) -> Vec<Instr> {
    vec![
        Instr::LoadI { dst: 0, imm: 600 },
        load_subject,
        Instr::LoadI { dst: 2, imm: 0 },
        Instr::Match { subject: 1, table: 2, bind_base },
        Instr::Jmp { offset: 1 },
        Instr::Jmp { offset: 2 },
        Instr::LoadI { dst: 0, imm: 4 },
        Instr::Halt,
        Instr::LoadI { dst: 0, imm: 300 },
        Instr::Halt,
    ]
}

#[test]
fn matches_a_number() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::number(11),
        PoolEntry::number(22),
    ];
    let result = run(&match_program(Instr::LoadI { dst: 1, imm: 22 }, 0), &pool).unwrap();
    assert_eq!(result, Value::Number(300));
}

#[test]
fn matches_the_first_case_too() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::number(11),
        PoolEntry::number(22),
    ];
    let result = run(&match_program(Instr::LoadI { dst: 1, imm: 11 }, 0), &pool).unwrap();
    assert_eq!(result, Value::Number(4));
}

#[test]
fn matches_a_symbol() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::symbol(11),
        PoolEntry::symbol(22),
    ];
    let result = run(&match_program(Instr::LoadS { dst: 1, imm: 22 }, 0), &pool).unwrap();
    assert_eq!(result, Value::Number(300));
}

#[test]
fn matches_a_data_symbol() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::data_symbol(3),
        PoolEntry::data_symbol(6),
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::number(66),
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::number(77),
        // The subject.
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::number(77),
    ];
    let result = run(&match_program(Instr::LoadSd { dst: 1, imm: 9 }, 0), &pool).unwrap();
    assert_eq!(result, Value::Number(300));
}

#[test]
fn binds_a_value_in_a_match() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::data_symbol(3),
        PoolEntry::data_symbol(6),
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::number(66),
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        // Store the matched field at bind_base + 1.
        PoolEntry::MatchVar(1),
        // The subject.
        PoolEntry::DataHeader { tag: 1, arity: 2 },
        PoolEntry::number(55),
        PoolEntry::number(77),
    ];
    let result = run(
        &[
            Instr::LoadI { dst: 0, imm: 600 },
            Instr::LoadI { dst: 4, imm: 66 },
            Instr::LoadSd { dst: 1, imm: 9 },
            Instr::LoadI { dst: 2, imm: 0 },
            // After matching, r3 + 1 holds the bound field (77).
            Instr::Match { subject: 1, table: 2, bind_base: 3 },
            Instr::Jmp { offset: 1 },
            Instr::Jmp { offset: 2 },
            Instr::LoadI { dst: 0, imm: 22 },
            Instr::Halt,
            Instr::Move { dst: 0, src: 4 },
            Instr::Halt,
        ],
        &pool,
    )
    .unwrap();
    assert_eq!(result, Value::Number(77));
}

// --- Faults ---

#[test]
fn no_matching_case_is_a_fault() {
    let pool = [
        PoolEntry::MatchHeader(2),
        PoolEntry::number(11),
        PoolEntry::number(22),
    ];
    let fault = run(&match_program(Instr::LoadI { dst: 1, imm: 33 }, 0), &pool).unwrap_err();
    assert_eq!(fault.pc, 3);
    assert_eq!(fault.kind, FaultKind::NoMatchingCase { table: 0 });
}

#[test]
fn mismatched_tags_never_dispatch() {
    let pool = [
        PoolEntry::MatchHeader(1),
        PoolEntry::number(22),
    ];
    // Symbol 22 against the number pattern 22.
    let fault = run(&match_program(Instr::LoadS { dst: 1, imm: 22 }, 0), &pool).unwrap_err();
    assert_eq!(fault.kind, FaultKind::NoMatchingCase { table: 0 });
}

#[test]
fn call_arguments_past_the_register_window_fault() {
    // base 31 leaves no room for even one argument register.
    let fault = run(
        &[
            Instr::LoadI { dst: 31, imm: 2 },
            Instr::Call { dst: 0, base: 31, argc: 1 },
            Instr::Halt,
        ],
        &[],
    )
    .unwrap_err();
    assert_eq!(fault.pc, 1);
    assert_eq!(
        fault.kind,
        FaultKind::IndexOutOfRange {
            what: "registers",
            index: 32,
            len: 32,
        }
    );
}

#[test]
fn a_lone_match_variable_case_is_rejected_at_load() {
    // A case that is nothing but a match variable would act as a wildcard
    // default; the pool refuses to parse it.
    let pool = [PoolEntry::MatchHeader(1), PoolEntry::MatchVar(0)];
    let fault = run(
        &[
            Instr::LoadI { dst: 1, imm: 999 },
            Instr::LoadI { dst: 2, imm: 0 },
            Instr::Match { subject: 1, table: 2, bind_base: 0 },
            Instr::Jmp { offset: 0 },
            Instr::Halt,
        ],
        &pool,
    )
    .unwrap_err();
    assert!(matches!(fault.kind, FaultKind::BadConstant { index: 1, .. }));
}

#[test]
fn depth_limit_applies_to_deep_call_chains() {
    let program = assemble(&[
        Instr::LoadI { dst: 1, imm: 0 },
        Instr::Call { dst: 0, base: 1, argc: 0 },
        Instr::Halt,
    ])
    .expect("program assembles");
    let fault = Vm::new(&program, &[])
        .expect("program loads")
        .with_max_depth(16)
        .run()
        .unwrap_err();
    assert_eq!(fault.kind, FaultKind::StackOverflow { limit: 16 });
}

#[test]
fn fault_reports_surface_as_diagnostics() {
    let fault = run(&[Instr::Ret], &[]).unwrap_err();
    let rendered = tagvm::diagnostic::json::render(&(&fault).into());
    let v: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
    assert_eq!(v["severity"], "error");
    assert_eq!(v["pc"], 0);
}
