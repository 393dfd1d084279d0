//! End-to-end tests: compile, execute natively, inspect the tape.
//!
//! Execution tests only run where generated code can be called (x86-64 unix).

#![cfg(all(unix, target_arch = "x86_64"))]

use bfjit::runtime::interpret;
use bfjit::{JitConfig, JitSession, RegionState, Tape, UnknownCharPolicy};

fn session() -> JitSession {
    let _ = env_logger::builder().is_test(true).try_init();
    JitSession::new(JitConfig::default().with_unknown_char_policy(UnknownCharPolicy::FailFast))
        .unwrap()
}

fn assert_cells(session: &JitSession, expected: &[u8]) {
    let cells = session.tape().cells();
    for (i, &want) in expected.iter().enumerate() {
        assert_eq!(cells[i], want, "cell {i}");
    }
    assert!(
        cells[expected.len()..].iter().all(|&c| c == 0),
        "unexpected nonzero cells: {}",
        session.tape().format_nonzero()
    );
}

#[test]
fn test_cursor_moves_and_cell_arithmetic() {
    let mut session = session();
    let report = session.run("++>+++>+<<-").unwrap();

    assert_cells(&session, &[1, 3, 1]);
    assert_eq!(report.region_state, RegionState::Released);
}

#[test]
fn test_loop_clears_cell() {
    let mut session = session();
    session.run("+++++[-]").unwrap();
    assert_cells(&session, &[]);
}

#[test]
fn test_skipped_loop_and_wrapping() {
    let mut session = session();
    // Loop on a zero cell is never entered; the decrement wraps to 255.
    session.run("[+++>+]-").unwrap();
    assert_cells(&session, &[255]);
}

#[test]
fn test_nested_loops_multiply() {
    let mut session = session();
    // 6 * 7 into cell 1, via a nested loop that copies through cell 2.
    session.run("++++++[>+++++++<-]>[>+>+<<-]>>[<<+>>-]").unwrap();
    assert_cells(&session, &[0, 42, 42]);
}

#[test]
fn test_matches_reference_interpreter() {
    let programs = [
        "+++[>+++++<-]>[>++>+<<-]",
        "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]",
        "-[>+<-----]>---",
        "+[[-]]>++[->+++<]",
    ];

    for source in programs {
        let mut session = session();
        session.run(source).unwrap();

        let mut tape = Tape::new(session.tape().len());
        interpret(
            source,
            UnknownCharPolicy::FailFast,
            &mut tape,
            &mut std::io::empty(),
            &mut std::io::sink(),
        )
        .unwrap();

        assert_eq!(session.tape().cells(), tape.cells(), "program {source}");
    }
}

#[test]
fn test_repeated_runs_share_tape() {
    let mut session = session();
    let program = session.compile("+>++").unwrap();
    session.execute(&program).unwrap();
    session.execute(&program).unwrap();
    assert_cells(&session, &[2, 4]);

    session.reset_tape();
    session.execute(&program).unwrap();
    assert_cells(&session, &[1, 2]);
    assert_eq!(session.stats().programs_executed, 3);
}

#[test]
fn test_sessions_are_isolated() {
    let mut a = session();
    let mut b = session();
    a.run("+++").unwrap();
    b.run(">+").unwrap();
    assert_cells(&a, &[3]);
    assert_cells(&b, &[0, 1]);
}

#[test]
fn test_long_loop_body() {
    // Body long enough that the displacements need all four bytes.
    let body = "+-".repeat(20_000);
    let source = format!("+[{body}-]");
    let mut session = session();
    let program = session.compile(&source).unwrap();
    assert!(program.code().len() > 1 << 16);

    session.execute(&program).unwrap();
    assert_cells(&session, &[]);
}
