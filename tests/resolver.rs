mod common;

use common::*;
use qanun_core::error::QanunError;
use qanun_core::token::TokenType;

// ─────────────────────────────────────────────────────────────────────────
// Distance recording
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn block_local_reference_gets_a_distance() {
    init_logging();

    let reference = variable("a");
    let id = ref_id(&reference);

    let program = [block(vec![
        var_stmt("a", Some(number(1.0))),
        block(vec![expr_stmt(reference)]),
    ])];

    let resolutions = resolve_ok(&program);
    assert_eq!(resolutions.get(id), Some(1));
}

#[test]
fn reference_in_the_declaring_scope_is_depth_zero() {
    init_logging();

    let reference = variable("a");
    let id = ref_id(&reference);

    let program = [block(vec![
        var_stmt("a", Some(number(1.0))),
        expr_stmt(reference),
    ])];

    let resolutions = resolve_ok(&program);
    assert_eq!(resolutions.get(id), Some(0));
}

#[test]
fn global_reference_is_left_unrecorded() {
    init_logging();

    let reference = variable("g");
    let id = ref_id(&reference);

    let program = [var_stmt("g", Some(number(1.0))), expr_stmt(reference)];

    let resolutions = resolve_ok(&program);
    assert_eq!(resolutions.get(id), None);
}

#[test]
fn parameter_reference_is_depth_zero_in_the_body() {
    init_logging();

    let reference = variable("x");
    let id = ref_id(&reference);

    let program = [fun_stmt("f", &["x"], vec![return_stmt(Some(reference))])];

    let resolutions = resolve_ok(&program);
    assert_eq!(resolutions.get(id), Some(0));
}

#[test]
fn this_and_super_get_their_closure_distances() {
    init_logging();

    let this_ref = this_expr();
    let this_id = ref_id(&this_ref);
    let super_ref = super_expr("m");
    let super_id = ref_id(&super_ref);

    let program = [
        class_stmt("Base", None, vec![fun_stmt("m", &[], vec![])], vec![]),
        class_stmt(
            "Child",
            Some("Base"),
            vec![fun_stmt(
                "m",
                &[],
                vec![
                    expr_stmt(get(this_ref, "field")),
                    expr_stmt(call(super_ref, vec![])),
                ],
            )],
            vec![],
        ),
    ];

    let resolutions = resolve_ok(&program);
    // body frame, then the 'this' frame, then the 'super' frame
    assert_eq!(resolutions.get(this_id), Some(1));
    assert_eq!(resolutions.get(super_id), Some(2));
}

// ─────────────────────────────────────────────────────────────────────────
// Structural errors
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn break_and_continue_outside_a_loop_are_errors() {
    let errors = resolve_errors(&[break_stmt(), continue_stmt()]);
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, QanunError::InvalidBreakContinue { .. })));
}

#[test]
fn break_inside_a_function_does_not_see_an_outer_loop() {
    let program = [while_stmt(
        boolean(true),
        block(vec![fun_stmt("f", &[], vec![break_stmt()]), break_stmt()]),
    )];

    let errors = resolve_errors(&program);
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        QanunError::InvalidBreakContinue { .. }
    ));
}

#[test]
fn switch_arms_are_not_loops() {
    // At the top level, break inside an arm is an error.
    let bare = [switch_stmt(number(1.0), vec![(None, vec![break_stmt()])])];
    let errors = resolve_errors(&bare);
    assert!(matches!(
        errors[0],
        QanunError::InvalidBreakContinue { .. }
    ));

    // Inside a loop, the same arm resolves fine: break targets the loop.
    let looped = [while_stmt(
        boolean(true),
        block(vec![switch_stmt(
            number(1.0),
            vec![(None, vec![break_stmt()])],
        )]),
    )];
    resolve_ok(&looped);
}

#[test]
fn return_outside_a_function_is_an_error() {
    let errors = resolve_errors(&[return_stmt(None)]);
    assert!(matches!(errors[0], QanunError::InvalidReturn { .. }));
}

#[test]
fn returning_a_value_from_an_initializer_is_an_error() {
    let program = [class_stmt(
        "C",
        None,
        vec![fun_stmt("init", &[], vec![return_stmt(Some(number(1.0)))])],
        vec![],
    )];

    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::InvalidReturn { .. }));
}

#[test]
fn bare_return_from_an_initializer_is_allowed() {
    let program = [class_stmt(
        "C",
        None,
        vec![fun_stmt("init", &[], vec![return_stmt(None)])],
        vec![],
    )];

    resolve_ok(&program);
}

#[test]
fn this_outside_a_class_is_an_error() {
    let errors = resolve_errors(&[expr_stmt(get(this_expr(), "x"))]);
    assert!(matches!(errors[0], QanunError::InvalidThisSuper { .. }));
}

#[test]
fn this_and_super_are_rejected_in_static_methods() {
    let program = [
        class_stmt("Base", None, vec![fun_stmt("m", &[], vec![])], vec![]),
        class_stmt(
            "Child",
            Some("Base"),
            vec![],
            vec![fun_stmt(
                "s",
                &[],
                vec![
                    expr_stmt(get(this_expr(), "x")),
                    expr_stmt(call(super_expr("m"), vec![])),
                ],
            )],
        ),
    ];

    let errors = resolve_errors(&program);
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, QanunError::InvalidThisSuper { .. })));
}

#[test]
fn super_without_a_superclass_is_an_error() {
    let program = [class_stmt(
        "C",
        None,
        vec![fun_stmt("m", &[], vec![expr_stmt(call(super_expr("m"), vec![]))])],
        vec![],
    )];

    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::InvalidThisSuper { .. }));
}

#[test]
fn a_class_cannot_inherit_from_itself() {
    let program = [class_stmt("C", Some("C"), vec![], vec![])];
    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::TypeMismatch { .. }));
}

#[test]
fn same_scope_redeclaration_is_caught_statically() {
    let program = [block(vec![
        var_stmt("a", Some(number(1.0))),
        val_stmt("a", number(2.0)),
    ])];

    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::Redeclaration { .. }));
}

#[test]
fn assigning_a_visible_constant_is_caught_statically() {
    let program = [block(vec![
        val_stmt("k", number(1.0)),
        expr_stmt(assign("k", number(2.0))),
    ])];

    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::ConstantAssignment { .. }));
}

#[test]
fn increment_of_a_visible_constant_is_caught_statically() {
    let program = [block(vec![
        val_stmt("k", number(1.0)),
        expr_stmt(unary(TokenType::PLUS_PLUS, "++", variable("k"), true)),
    ])];

    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::ConstantAssignment { .. }));
}

#[test]
fn reading_a_local_in_its_own_initializer_is_an_error() {
    let program = [block(vec![var_stmt("a", Some(variable("a")))])];
    let errors = resolve_errors(&program);
    assert!(matches!(errors[0], QanunError::TypeMismatch { .. }));
}

#[test]
fn errors_are_collected_as_a_batch() {
    let program = [
        break_stmt(),
        return_stmt(None),
        block(vec![
            val_stmt("k", number(1.0)),
            expr_stmt(assign("k", number(2.0))),
        ]),
    ];

    let errors = resolve_errors(&program);
    assert_eq!(errors.len(), 3);
}
