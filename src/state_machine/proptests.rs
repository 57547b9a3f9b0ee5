//! Property-based tests for the step tree
//!
//! These tests verify key invariants hold across all possible inputs.

use super::event::Answer;
use super::state::*;
use super::transition::*;
use super::*;
use crate::config::DialogConfig;
use crate::runtime::testing::{conversant, group_message, private_message, MockRecordStore};
use crate::token::TokenCodec;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> DialogContext {
    DialogContext::new(DialogConfig::default(), TokenCodec::new("prop-secret").unwrap())
}

/// Drive one transition to completion; the mock store never awaits anything
fn run(
    step: Step,
    msg: &InboundMessage,
    store: &mut MockRecordStore,
) -> Result<Transition, EngineFault> {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(transition(step, msg, store, &test_context()))
}

fn is_recognized_answer(text: &str) -> bool {
    Answer::parse(text).is_some()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.!?]{0,40}".prop_filter("must not look like a command", |text| {
        !text.trim_start().starts_with('/')
    })
}

fn arb_known_command() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("/start"), Just("/privacy"), Just("/whois")]
}

fn arb_other_bot() -> impl Strategy<Value = String> {
    "[a-z]{3,12}bot".prop_filter("must not be our bot", |bot| {
        !bot.eq_ignore_ascii_case(&DialogConfig::default().bot_username)
    })
}

fn arb_answer() -> impl Strategy<Value = (Answer, &'static str)> {
    prop_oneof![
        Just((Answer::Yes, prompt::YES_LABEL)),
        Just((Answer::No, prompt::NO_LABEL)),
        Just((Answer::Yes, "sì")),
        Just((Answer::No, "no")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Invariant 1: text that is not a command never gets a reply
    #[test]
    fn prop_plain_text_is_ignored(text in arb_plain_text(), private in any::<bool>()) {
        let mut store = MockRecordStore::new();
        let msg = if private {
            private_message(1, &text)
        } else {
            group_message(1, -100, &text)
        };
        let result = run(Step::Root, &msg, &mut store).unwrap();
        prop_assert_eq!(result, Transition::Finish(None));
    }

    // Invariant 2: commands addressed to another bot never get a reply
    #[test]
    fn prop_commands_for_other_bots_are_ignored(
        command in arb_known_command(),
        bot in arb_other_bot(),
        argument in "[a-z ]{0,10}",
    ) {
        let mut store = MockRecordStore::new();
        let msg = private_message(1, &format!("{command}@{bot} {argument}"));
        let result = run(Step::Root, &msg, &mut store).unwrap();
        prop_assert_eq!(result, Transition::Finish(None));
    }

    // Invariant 3: /start and /privacy outside a private chat only point there
    #[test]
    fn prop_private_commands_are_gated_in_groups(
        command in prop_oneof![Just("/start"), Just("/privacy")],
        argument in "[A-Za-z0-9_-]{0,20}",
    ) {
        let mut store = MockRecordStore::new();
        let msg = group_message(1, -100, &format!("{command} {argument}"));
        let result = run(Step::Root, &msg, &mut store).unwrap();
        prop_assert_eq!(
            result,
            Transition::Finish(Some(Prompt::notice(texts::private_chat_only(
                &DialogConfig::default()
            ))))
        );
    }

    // Invariant 4: anything before an inner `@` is looked up as an e-mail prefix
    #[test]
    fn prop_email_queries_use_local_part(local in "[a-z0-9.]{1,12}", domain in "[a-z.]{0,20}") {
        prop_assert_eq!(
            classify_query(&format!("{local}@{domain}")),
            Some(WhoisQuery::Email(local))
        );
    }

    #[test]
    fn prop_numeric_queries_are_email_prefixes(number in 1u32..10_000_000) {
        prop_assert_eq!(
            classify_query(&number.to_string()),
            Some(WhoisQuery::Email(number.to_string()))
        );
    }

    #[test]
    fn prop_spaced_queries_are_names(first in "[A-Za-z]{1,10}", last in "[A-Za-z]{1,10}") {
        let name = format!("{first} {last}");
        prop_assert_eq!(classify_query(&name), Some(WhoisQuery::Name(name)));
    }

    #[test]
    fn prop_handles_drop_leading_at(handle in "[a-z][a-z0-9_]{2,15}", with_at in any::<bool>()) {
        let query = if with_at { format!("@{handle}") } else { handle.clone() };
        prop_assert_eq!(classify_query(&query), Some(WhoisQuery::Username(handle)));
    }

    // Invariant 5: an unrecognized answer re-asks and writes nothing
    #[test]
    fn prop_unrecognized_answer_reasks(text in "[a-z]{3,12}".prop_filter("must not be an answer", |t| !is_recognized_answer(t))) {
        let mut store = MockRecordStore::new();
        let student = store.add_student("jdoe", "Jane", "Doe");
        let step = Step::Register {
            email_prefix: "jdoe".to_string(),
            phase: RegisterPhase::ChoosingVisibility { student },
        };

        let result = run(step.clone(), &private_message(1, &text), &mut store).unwrap();
        match result {
            Transition::Suspend { resume, prompt } => {
                prop_assert_eq!(resume, step);
                prop_assert!(prompt.is_question());
            }
            other => prop_assert!(false, "expected a question, got {:?}", other),
        }
        prop_assert_eq!(store.commits(), 0);
        prop_assert!(store.links().is_empty());
    }

    // Invariant 6: declining to be listed is what makes a record private
    #[test]
    fn prop_privacy_follows_answer((answer, text) in arb_answer()) {
        let mut store = MockRecordStore::new();
        let student = store.add_student("jdoe", "Jane", "Doe");
        store.add_link(&conversant(1, Some("jane")), &student, answer == Answer::Yes);
        let step = Step::Privacy {
            phase: PrivacyPhase::ChoosingVisibility { student_id: student.id },
        };

        let result = run(step, &private_message(1, text), &mut store).unwrap();
        prop_assert!(matches!(result, Transition::Finish(Some(_))));
        prop_assert_eq!(store.commits(), 1);
        prop_assert_eq!(store.privacy_of(student.id), Some(answer == Answer::No));
    }

    // Invariant 7: lookups never write
    #[test]
    fn prop_whois_is_read_only(query in "[@a-zA-Z0-9 .]{0,24}") {
        let mut store = MockRecordStore::new();
        let student = store.add_student("jdoe", "Jane", "Doe");
        store.add_link(&conversant(1, Some("jane")), &student, false);

        let mut step = Step::Whois { query: query.clone() };
        let msg = private_message(2, &format!("/whois {query}"));
        for _ in 0..MAX_DELEGATION_DEPTH {
            match run(step, &msg, &mut store).unwrap() {
                Transition::Delegate(next) => step = next,
                Transition::Finish(reply) => {
                    prop_assert!(reply.is_some());
                    break;
                }
                Transition::Suspend { .. } => {
                    prop_assert!(false, "lookups never ask questions");
                    break;
                }
            }
        }
        prop_assert_eq!(store.commits(), 0);
    }
}
