#![forbid(unsafe_code)]

//! Property tests for history and read-only region invariants.
//!
//! Validates:
//! - The history cursor never leaves `[0, len]`.
//! - No two adjacent history entries are identical.
//! - Rejected navigation never moves the cursor.
//! - The region policy never allows edits off the last line or in the prompt.

use proptest::prelude::*;

use replkit_core::{CommandHistory, EditContext, Position, Selection};

// ============================================================================
// Strategy helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Next,
    Previous,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::sample::select(vec!["", "a", "b", "print(x)", "x = 1"])
            .prop_map(|s| Op::Add(s.to_owned())),
        2 => Just(Op::Next),
        2 => Just(Op::Previous),
    ]
}

fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..=max_len)
}

// ============================================================================
// History
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn cursor_stays_in_bounds_and_no_adjacent_duplicates(ops in ops_strategy(60)) {
        let mut history = CommandHistory::new();
        for op in ops {
            let before = history.cursor();
            match op {
                Op::Add(line) => {
                    history.add(&line);
                    prop_assert_eq!(history.cursor(), history.len());
                }
                Op::Next => {
                    if !history.move_next() {
                        prop_assert_eq!(history.cursor(), before);
                    }
                }
                Op::Previous => {
                    if !history.move_previous() {
                        prop_assert_eq!(history.cursor(), before);
                    }
                }
            }
            prop_assert!(history.cursor() <= history.len());
            let entries: Vec<&str> = history.iter().collect();
            for pair in entries.windows(2) {
                prop_assert_ne!(pair[0], pair[1]);
            }
            prop_assert!(entries.iter().all(|e| !e.is_empty()));
        }
    }

    #[test]
    fn previous_after_add_recalls_newest_distinct_line(lines in prop::collection::vec("[a-c]{1,2}", 1..20)) {
        let mut history = CommandHistory::new();
        prop_assert_eq!(history.current(), None);
        for line in &lines {
            history.add(line);
        }
        prop_assert!(history.move_previous());
        prop_assert_eq!(history.current(), lines.last().map(String::as_str));
    }
}

// ============================================================================
// Region policy
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn edits_only_after_prompt_on_last_line(
        line_count in 1usize..20,
        prompt_len in 0usize..8,
        line in 1usize..20,
        column in 1usize..30,
    ) {
        let line = line.min(line_count);
        let ctx = EditContext::new(Position::new(line, column), line_count, prompt_len);
        let editable = line == line_count && column > prompt_len;
        prop_assert_eq!(ctx.can_insert(), editable);
        prop_assert_eq!(ctx.can_delete(), editable);
        if ctx.can_backspace() {
            prop_assert!(editable && column > prompt_len + 1);
        }
    }

    #[test]
    fn deletable_selections_stay_inside_input(
        prompt_len in 0usize..8,
        start in 1usize..20,
        end in 1usize..20,
        anchor_line in 1usize..4,
    ) {
        let sel = Selection::new(Position::new(anchor_line, start), Position::new(3, end));
        let ctx = EditContext::new(Position::new(3, end), 3, prompt_len).with_selection(Some(sel));
        if ctx.can_delete() && !sel.is_empty() {
            prop_assert_eq!(sel.start().line, 3);
            prop_assert!(sel.start().column > prompt_len);
            prop_assert!(sel.end().column > prompt_len);
        }
    }
}
