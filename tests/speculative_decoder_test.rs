//! Integration tests for SpeculativeDecoder over in-memory scorers.

use speculative_sampling::{
    AutoregressiveDecoder, Error, FinalToken, FnScorer, Result, Scorer, SpeculativeConfig,
    SpeculativeDecoder, StaticScorer,
};

/// Target whose next-token distribution depends on the last token.
fn markov_row(prefix: &[u32]) -> Result<Vec<f32>> {
    Ok(match prefix.last() {
        Some(0) => vec![0.2, 0.5, 0.3],
        Some(1) => vec![0.6, 0.1, 0.3],
        _ => vec![0.1, 0.1, 0.8],
    })
}

fn config(k: usize) -> SpeculativeConfig {
    SpeculativeConfig::default().num_tokens(k)
}

#[test]
fn test_output_length_is_exact() {
    for k in [0, 1, 3, 8] {
        for n in [0, 1, 5, 17] {
            let mut decoder = SpeculativeDecoder::with_seed(
                StaticScorer::new(vec![0.5, 0.25, 0.25]).unwrap(),
                FnScorer::new(3, markov_row),
                config(k),
                k as u64 * 100 + n as u64,
            )
            .unwrap();

            let prompt = [2, 0, 1];
            let out = decoder.generate(&prompt, n).unwrap();

            assert_eq!(out.len(), prompt.len() + n, "K={k} N={n}");
            assert_eq!(&out[..prompt.len()], &prompt);
            assert!(out.iter().all(|&t| t < 3));
            assert_eq!(decoder.stats().generated_tokens, n);
        }
    }
}

#[test]
fn test_identical_models_accept_everything() {
    let mut decoder = SpeculativeDecoder::with_seed(
        FnScorer::new(3, markov_row),
        FnScorer::new(3, markov_row),
        config(3),
        1,
    )
    .unwrap();

    let out = decoder.generate(&[0], 8).unwrap();
    let stats = decoder.stats();

    assert_eq!(out.len(), 9);
    // Two iterations of three accepted drafts plus a bonus token each.
    assert_eq!(stats.iterations, 2);
    assert_eq!(stats.accepted_tokens, 6);
    assert_eq!(stats.bonus_tokens, 2);
    assert_eq!(stats.resampled_tokens, 0);
    assert_eq!(stats.target_calls, 2);
    assert_eq!(stats.acceptance_rate(), Some(1.0));
    assert_eq!(stats.tokens_per_iteration(), 4.0);
}

#[test]
fn test_disjoint_models_reject_everything() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![1.0, 0.0]).unwrap(),
        StaticScorer::new(vec![0.0, 1.0]).unwrap(),
        config(4),
        9,
    )
    .unwrap();

    let out = decoder.generate(&[0], 5).unwrap();
    let stats = decoder.stats();

    assert_eq!(out, vec![0, 1, 1, 1, 1, 1]);
    assert_eq!(stats.iterations, 5);
    assert_eq!(stats.accepted_tokens, 0);
    // The last iteration has room for no drafts, so it ends with a bonus.
    assert_eq!(stats.resampled_tokens, 4);
    assert_eq!(stats.bonus_tokens, 1);
    assert_eq!(stats.drafted_tokens, 4 + 3 + 2 + 1);
    assert_eq!(stats.acceptance_rate(), Some(0.0));
}

#[test]
fn test_call_counts_per_iteration() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        config(2),
        4,
    )
    .unwrap();

    decoder.generate(&[1], 3).unwrap();
    let stats = decoder.stats();

    // K draft calls while drafting plus one joint scoring call.
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.draft_calls, 3);
    assert_eq!(stats.target_calls, 1);
}

#[test]
fn test_zero_lookahead_matches_autoregressive() {
    for seed in [0, 17, 12345] {
        let mut speculative = SpeculativeDecoder::with_seed(
            StaticScorer::new(vec![1.0, 1.0, 1.0]).unwrap(),
            FnScorer::new(3, markov_row),
            config(0),
            seed,
        )
        .unwrap();
        let mut autoregressive = AutoregressiveDecoder::with_seed(FnScorer::new(3, markov_row), seed);

        let a = speculative.generate(&[2, 2], 25).unwrap();
        let b = autoregressive.generate(&[2, 2], 25).unwrap();

        assert_eq!(a, b, "seed {seed}");
        assert_eq!(speculative.stats().draft_calls, 0);
        assert_eq!(speculative.stats().target_calls, 25);
        assert_eq!(speculative.stats().acceptance_rate(), None);
    }
}

#[test]
fn test_same_seed_same_output() {
    let run = |seed| {
        let mut decoder = SpeculativeDecoder::with_seed(
            StaticScorer::new(vec![0.3, 0.3, 0.4]).unwrap(),
            FnScorer::new(3, markov_row),
            config(3),
            seed,
        )
        .unwrap();
        decoder.generate(&[0, 1], 20).unwrap()
    };

    assert_eq!(run(77), run(77));
}

#[test]
fn test_scorer_failure_propagates() {
    let failing = FnScorer::new(3, |prefix: &[u32]| {
        if prefix.len() > 4 {
            Err(Error::Scorer("backend unavailable".into()))
        } else {
            markov_row(prefix)
        }
    });
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.2, 0.3, 0.5]).unwrap(),
        failing,
        config(2),
        0,
    )
    .unwrap();

    let result = decoder.generate(&[0, 1], 10);
    assert!(matches!(result, Err(Error::Scorer(msg)) if msg == "backend unavailable"));
}

#[test]
fn test_invalid_row_propagates() {
    let negative = FnScorer::new(2, |_: &[u32]| Ok(vec![1.5, -0.5]));
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        negative,
        config(1),
        0,
    )
    .unwrap();

    assert!(matches!(
        decoder.generate(&[0], 3),
        Err(Error::InvalidDistribution(_))
    ));
}

#[test]
fn test_empty_prompt() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        config(4),
        0,
    )
    .unwrap();

    assert!(matches!(decoder.generate(&[], 4), Err(Error::EmptyPrompt)));
}

#[test]
fn test_single_step_returns_verification() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![1.0, 0.0]).unwrap(),
        StaticScorer::new(vec![0.0, 1.0]).unwrap(),
        config(3),
        0,
    )
    .unwrap();

    let verification = decoder.speculative_step(&[0, 0]).unwrap();

    assert!(verification.accepted.is_empty());
    assert_eq!(verification.final_token, 1);
    assert_eq!(verification.outcome, FinalToken::Resampled { position: 0 });
    assert_eq!(decoder.stats().drafted_tokens, 3);
}

#[test]
fn test_overflowing_budget_rejected() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        StaticScorer::new(vec![0.5, 0.5]).unwrap(),
        config(usize::MAX),
        0,
    )
    .unwrap();

    assert!(matches!(
        decoder.speculative_step(&[0]),
        Err(Error::BudgetOverflow { .. })
    ));
    assert!(matches!(
        decoder.generate(&[0], usize::MAX),
        Err(Error::BudgetOverflow { .. })
    ));
    assert_eq!(decoder.stats().target_calls, 0);

    // A huge K is clamped by the remaining budget in `generate`.
    let out = decoder.generate(&[0], 3).unwrap();
    assert_eq!(out.len(), 4);
}

#[test]
fn test_swap_draft_and_release_models() {
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![1.0, 0.0]).unwrap(),
        StaticScorer::new(vec![0.0, 1.0]).unwrap(),
        config(2),
        0,
    )
    .unwrap();

    decoder.generate(&[0], 3).unwrap();
    assert_eq!(decoder.stats().accepted_tokens, 0);

    // A draft that matches the target is accepted every time.
    *decoder.draft_model_mut() = StaticScorer::new(vec![0.0, 1.0]).unwrap();
    let out = decoder.generate(&[0], 3).unwrap();
    assert_eq!(out, vec![0, 1, 1, 1]);
    assert_eq!(decoder.stats().accepted_tokens, 2);
    assert_eq!(decoder.stats().acceptance_rate(), Some(1.0));

    *decoder.target_model_mut() = StaticScorer::new(vec![1.0, 0.0]).unwrap();
    assert_eq!(decoder.generate(&[1], 2).unwrap(), vec![1, 0, 0]);

    let (draft, target) = decoder.into_models();
    assert_eq!(draft.vocab_size(), 2);
    assert_eq!(target.vocab_size(), 2);
}

/// Two-token continuations from speculative decoding must follow the
/// target's joint distribution `q(a | 0) · q(b | a)`.
#[test]
fn test_joint_output_follows_target() {
    let trials = 40_000;
    let mut decoder = SpeculativeDecoder::with_seed(
        StaticScorer::new(vec![0.5, 0.25, 0.25]).unwrap(),
        FnScorer::new(3, markov_row),
        config(2),
        31337,
    )
    .unwrap();

    let mut counts = [0usize; 9];
    for _ in 0..trials {
        let out = decoder.generate(&[0], 2).unwrap();
        counts[(out[1] * 3 + out[2]) as usize] += 1;
    }

    let first = markov_row(&[0]).unwrap();
    let mut statistic = 0.0f64;
    for a in 0..3u32 {
        let second = markov_row(&[a]).unwrap();
        for b in 0..3u32 {
            let expected = (first[a as usize] * second[b as usize]) as f64 * trials as f64;
            let observed = counts[(a * 3 + b) as usize] as f64;
            statistic += (observed - expected).powi(2) / expected;
        }
    }

    // 8 degrees of freedom; 26.12 is the 0.999 quantile.
    assert!(statistic < 26.12, "chi-squared {statistic}, counts {counts:?}");
}
