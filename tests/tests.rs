// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use meta_regex::{compile, compile_with_config, Config, Engine, Strategy};

/// Every configuration corner the engine is supposed to be indifferent to.
fn all_configs() -> Vec<Config> {
    vec![
        Config::new(),
        Config::new().dfa(false),
        Config::new().prefilter(false),
        Config::new().dfa(false).prefilter(false),
        Config::new().ascii_optimization(false),
        Config::new().max_dfa_states(3),
    ]
}

/// Check one (pattern, haystack) against an expected leftmost-first span,
/// across every engine configuration and every way of asking.
fn check(pattern: &str, hay: &str, expected: Option<(usize, usize)>) {
    for config in all_configs() {
        let re = compile_with_config(pattern, config).unwrap();
        let hb = hay.as_bytes();
        assert_eq!(
            re.find_indices(hb),
            expected,
            "find_indices mismatch for {:?} on {:?} (strategy {:?})",
            pattern,
            hay,
            re.strategy()
        );
        assert_eq!(
            re.is_match(hb),
            expected.is_some(),
            "is_match mismatch for {:?} on {:?} (strategy {:?})",
            pattern,
            hay,
            re.strategy()
        );
        let m = re.find(hb);
        assert_eq!(m.map(|m| (m.start(), m.end())), expected);
        let caps = re.find_submatch(hb);
        assert_eq!(
            caps.and_then(|c| c.get(0)).map(|m| (m.start(), m.end())),
            expected,
            "find_submatch mismatch for {:?} on {:?}",
            pattern,
            hay
        );
    }
}

// ---- the concrete end-to-end scenarios ----

#[test]
fn scenario_email_submatch() {
    let re = compile(r"(\w+)@(\w+)\.(\w+)").unwrap();
    let caps = re.find_submatch(b"user@example.com").unwrap();
    assert_eq!(caps.get(0).unwrap().as_bytes(), b"user@example.com");
    assert_eq!(caps.get(1).unwrap().as_bytes(), b"user");
    assert_eq!(caps.get(2).unwrap().as_bytes(), b"example");
    assert_eq!(caps.get(3).unwrap().as_bytes(), b"com");
}

#[test]
fn scenario_file_extensions() {
    check(r".*\.(txt|log|md)", "readme.txt", Some((0, 10)));
    check(r".*\.(txt|log|md)", "app.log", Some((0, 7)));
    check(r".*\.(txt|log|md)", "image.png", None);
}

#[test]
fn scenario_inner_literal() {
    let hay = "ERROR: connection refused";
    check(".*connection.*", hay, Some((0, hay.len())));
}

#[test]
fn scenario_multiline_php() {
    let re = compile(r"(?m)^/.*\.php").unwrap();
    assert_eq!(re.strategy(), Strategy::MultilineReverseSuffix);
    let hay = b"/index.php\n/admin/login.php\n/other";
    assert_eq!(re.count(hay, -1), 2);
}

#[test]
fn scenario_empty_match_discipline() {
    let re = compile("a*").unwrap();
    assert_eq!(
        re.find_all_indices_streaming(b"ab", -1, None),
        vec![(0, 1), (2, 2)]
    );
}

#[test]
fn scenario_large_input_backtracker_fallback() {
    let re = compile(r"(\w{2,8})+").unwrap();
    assert_eq!(re.strategy(), Strategy::BoundedBacktracker);
    let hay: Vec<u8> = b"abcdefgh".repeat(256 * 1024);
    assert_eq!(hay.len(), 2 << 20);
    assert_eq!(re.find_indices(&hay), Some((0, hay.len())));
    // The same call must agree with a pure NFA engine.
    let nfa_only =
        compile_with_config(r"(\w{2,8})+", Config::new().dfa(false)).unwrap();
    assert_eq!(nfa_only.find_indices(&hay), Some((0, hay.len())));
}

#[test]
fn scenario_anchored_alternation() {
    check(r"^(\d+|UUID|hex32)", "UUID-1234", Some((0, 4)));
    check(r"^(\d+|UUID|hex32)", "xyz", None);
}

#[test]
fn scenario_version_number() {
    check(r"\d+\.\d+\.\d+", "version 1.2.3 here", Some((8, 13)));
}

#[test]
fn scenario_multi_literal() {
    check("foo|bar|baz", "prefix bar suffix", Some((7, 10)));
}

#[test]
fn scenario_dna_alternation() {
    check("[cgt]gggtaaa|tttaccc[acg]", "xxxcgggtaaaxxx", Some((3, 11)));
}

// ---- universal correctness over a grab bag of patterns ----

#[test]
fn battery() {
    check("abc", "zabcz", Some((1, 4)));
    check("abc", "zabz", None);
    check("a+", "baaa", Some((1, 4)));
    check("a|ab", "ab", Some((0, 1)));
    check("ab|a", "ab", Some((0, 2)));
    check("^foo", "foobar", Some((0, 3)));
    check("^foo", "zfoo", None);
    check("^foo$", "foo", Some((0, 3)));
    check("^foo$", "foox", None);
    check("foo$", "xfoo", Some((1, 4)));
    check("foo$", "foox", None);
    check(r"\bword\b", "a word here", Some((2, 6)));
    check(r"\bword\b", "sword", None);
    check("[a-z]+", "123abc456", Some((3, 6)));
    check("[a-z]+[0-9]+", "!!abc123!!", Some((2, 8)));
    check(r"\d{2,4}", "1 22 333", Some((2, 4)));
    check("(?m)^b", "a\nb", Some((2, 3)));
    check("(?m)a$", "a\nb", Some((0, 1)));
    check("x?", "y", Some((0, 0)));
    check("", "abc", Some((0, 0)));
    check(r"(?s).*", "a\nb", Some((0, 3)));
    check(".*", "a\nb", Some((0, 1)));
    check("héllo", "say héllo!", Some((4, 10)));
    check(r"\w+", "·héllo·", Some((2, 8)));
    check(r"[0-9]+\.[0-9]+", "pi is 3.14159", Some((6, 13)));
    check("(a(b)?)+", "abaab", Some((0, 5)));
}

#[test]
fn find_at_semantics() {
    let re = compile("a+").unwrap();
    assert_eq!(re.find_indices_at(b"aa baa", 0), Some((0, 2)));
    assert_eq!(re.find_indices_at(b"aa baa", 1), Some((1, 2)));
    assert_eq!(re.find_indices_at(b"aa baa", 2), Some((4, 6)));
    assert_eq!(re.find_indices_at(b"aa baa", 6), None);
    // Start-anchored patterns never match past position 0.
    let re = compile("^a").unwrap();
    assert!(re.is_start_anchored());
    assert_eq!(re.find_indices_at(b"aaa", 1), None);
}

#[test]
fn streaming_agrees_with_count_and_manual_iteration() {
    let cases: &[(&str, &str)] = &[
        ("a*", "aabaa"),
        ("", "xyz"),
        (r"\d+", "1 22 333 4444"),
        ("[a-z]+", "one two three"),
        ("foo|bar", "foo bar foofoo"),
        (r"\w+", "héllo wörld"),
        ("x*y?", "zzxy"),
    ];
    for &(pattern, hay) in cases {
        let re = compile(pattern).unwrap();
        let hb = hay.as_bytes();
        let all = re.find_all_indices_streaming(hb, -1, None);
        assert_eq!(all.len(), re.count(hb, -1), "count for {:?}", pattern);

        // A reference engine with every optimization disabled must produce
        // the identical stream.
        let plain = compile_with_config(
            pattern,
            Config::new().dfa(false).prefilter(false).ascii_optimization(false),
        )
        .unwrap();
        assert_eq!(
            plain.find_all_indices_streaming(hb, -1, None),
            all,
            "stream equivalence for {:?}",
            pattern
        );

        // The limit caps the output.
        if all.len() > 1 {
            assert_eq!(re.find_all_indices_streaming(hb, 1, None).len(), 1);
            assert_eq!(re.count(hb, 1), 1);
        }
        // Buffer reuse keeps the contents.
        let buf = Vec::with_capacity(64);
        assert_eq!(re.find_all_indices_streaming(hb, -1, Some(buf)), all);
    }
}

#[test]
fn empty_pattern_matches_everywhere() {
    let re = compile("").unwrap();
    assert_eq!(
        re.find_all_indices_streaming(b"ab", -1, None),
        vec![(0, 0), (1, 1), (2, 2)]
    );
}

#[test]
fn find_all_submatch_uses_the_same_discipline() {
    let re = compile(r"(\w+)@(\w+)").unwrap();
    let hay = b"a@b c@d e@f";
    let all = re.find_all_submatch(hay, -1);
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].get(0).unwrap().as_bytes(), b"c@d");
    assert_eq!(all[1].get(2).unwrap().as_bytes(), b"d");
    let limited = re.find_all_submatch(hay, 2);
    assert_eq!(limited.len(), 2);

    // Empty-capable pattern: no overlapping empties.
    let re = compile("(a*)").unwrap();
    let spans: Vec<(usize, usize)> = re
        .find_all_submatch(b"ab", -1)
        .iter()
        .map(|c| {
            let m = c.get(0).unwrap();
            (m.start(), m.end())
        })
        .collect();
    assert_eq!(spans, vec![(0, 1), (2, 2)]);
}

#[test]
fn named_groups() {
    let re = compile(r"(?P<user>\w+)@(?P<host>\w+)").unwrap();
    assert_eq!(re.num_captures(), 3);
    assert_eq!(
        re.subexp_names(),
        &[None, Some("user".to_string()), Some("host".to_string())]
    );
    let caps = re.find_submatch(b"joe@box").unwrap();
    assert_eq!(caps.name("user").unwrap().as_bytes(), b"joe");
    assert_eq!(caps.name("host").unwrap().as_bytes(), b"box");
    assert!(caps.name("nope").is_none());
}

#[test]
fn longest_mode() {
    let re = compile("a|ab").unwrap();
    assert_eq!(re.find_indices(b"ab"), Some((0, 1)));
    re.set_longest(true);
    assert_eq!(re.find_indices(b"ab"), Some((0, 2)));
    re.set_longest(false);
    assert_eq!(re.find_indices(b"ab"), Some((0, 1)));
}

#[test]
fn cache_full_degrades_to_nfa() {
    let re = compile_with_config(
        "(?:a.){51}",
        Config::new().prefilter(false).max_dfa_states(3),
    )
    .unwrap();
    assert_eq!(re.strategy(), Strategy::Dfa);
    let hay: Vec<u8> = b"ax".repeat(51);
    assert_eq!(re.find_indices(&hay), Some((0, hay.len())));
    let stats = re.stats();
    assert!(stats.dfa_cache_full > 0, "stats: {:?}", stats);
    assert!(stats.nfa_searches > 0, "stats: {:?}", stats);
}

#[test]
fn anti_quadratic_inner_guard() {
    // Many inner hits, none of which can complete a match. One failed
    // candidate plus the guard must hand the call to the NFA instead of
    // rescanning from every hit.
    let re = compile("ERROR.*connection.*timeout").unwrap();
    assert_eq!(re.strategy(), Strategy::ReverseInner);
    let hay: Vec<u8> =
        [b"ERROR".to_vec(), b"connection".repeat(20_000)].concat();
    assert_eq!(re.find_indices(&hay), None);
    assert!(re.stats().nfa_searches > 0);

    let hay2: Vec<u8> = [
        b"ERROR".to_vec(),
        b"connection".repeat(2_000),
        b"timeout".to_vec(),
    ]
    .concat();
    assert_eq!(re.find_indices(&hay2), Some((0, hay2.len())));
}

#[test]
fn suffix_strategy_quadratic_guard() {
    // A class-star prefix with a single required suffix literal: repeated
    // suffix hits whose verification fails must trip the reverse guard.
    let re = compile(".*connection.*timeout").unwrap();
    assert_eq!(re.strategy(), Strategy::ReverseSuffix);
    let hay: Vec<u8> = b"timeout ".repeat(10_000);
    // Every "timeout" lacks a "connection" before it.
    assert_eq!(re.find_indices(&hay), None);
}

#[test]
fn stats_accumulate_and_reset() {
    let re = compile("foo|bar|baz").unwrap();
    assert!(re.is_match(b"xx bar yy"));
    assert!(re.stats().prefilter_hits > 0);
    re.reset_stats();
    assert_eq!(re.stats().prefilter_hits, 0);
}

#[test]
fn config_validation() {
    assert!(compile_with_config("a", Config::new().max_dfa_states(2)).is_err());
    assert!(compile_with_config("a", Config::new().max_literals(0)).is_err());
    assert!(compile_with_config("a", Config::new().determinize_limit(0)).is_err());
}

#[test]
fn compile_errors() {
    assert!(compile("a(").is_err());
    assert!(compile("a{2,1}").is_err());
    let err = compile_with_config("a", Config::new().max_dfa_states(0))
        .unwrap_err()
        .to_string();
    assert!(err.starts_with("regexp: "), "got {:?}", err);
}

#[test]
fn deep_nesting_is_rejected() {
    let pattern = format!("{}a{}", "(".repeat(300), ")".repeat(300));
    assert!(compile(&pattern).is_err());
}

#[test]
fn anchors_and_flags() {
    let re = compile("^foo$").unwrap();
    assert!(re.is_start_anchored());
    assert!(re.is_always_anchored());
    let re = compile("foo").unwrap();
    assert!(!re.is_start_anchored());
    assert!(!re.is_always_anchored());
}

#[test]
fn thread_safety() {
    let patterns = [r"(\w+)@(\w+)", "foo|bar|baz", r".*\.txt", "[a-z]+[0-9]+"];
    let haystacks: Vec<String> = (0..64)
        .map(|i| format!("x{} foo a{}@b{} name{}.txt ab{}cd{}", i, i, i, i, i, i))
        .collect();
    for pattern in patterns {
        let re = Arc::new(compile(pattern).unwrap());
        let expected: Vec<Option<(usize, usize)>> = haystacks
            .iter()
            .map(|h| re.find_indices(h.as_bytes()))
            .collect();
        let mut handles = vec![];
        for t in 0..8 {
            let re = Arc::clone(&re);
            let haystacks = haystacks.clone();
            let expected = expected.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..20 {
                    for (h, want) in haystacks.iter().zip(expected.iter()) {
                        let got = re.find_indices(h.as_bytes());
                        assert_eq!(got, *want, "thread {} on {:?}", t, h);
                        assert_eq!(re.is_match(h.as_bytes()), want.is_some());
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn random_equivalence_between_configs() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let patterns =
        [r"a+b", r"(ab|a)+", r"[ab]{2,5}", r"a.b", r"b$", "^a", r"\bab"];
    let engines: Vec<Vec<Engine>> = patterns
        .iter()
        .map(|p| {
            all_configs()
                .into_iter()
                .map(|c| compile_with_config(p, c).unwrap())
                .collect()
        })
        .collect();
    for _ in 0..200 {
        let len = rng.gen_range(0..24);
        let hay: Vec<u8> =
            (0..len).map(|_| *b"ab ".get(rng.gen_range(0..3)).unwrap()).collect();
        for variants in &engines {
            let want = variants[0].find_indices(&hay);
            for re in &variants[1..] {
                assert_eq!(
                    re.find_indices(&hay),
                    want,
                    "pattern {:?} on {:?}",
                    variants[0].pattern(),
                    String::from_utf8_lossy(&hay)
                );
            }
        }
    }
}

#[test]
fn strategies_match_the_table() {
    let table: &[(&str, Strategy)] = &[
        ("^foo", Strategy::AnchoredLiteral),
        ("^(GET|PUT|POST)", Strategy::BranchDispatch),
        ("foo.*bar$", Strategy::ReverseAnchored),
        (r".*\.(txt|log|md)", Strategy::ReverseSuffixSet),
        (r".*\.txt", Strategy::ReverseSuffix),
        (r"(?m)^/.*\.php", Strategy::MultilineReverseSuffix),
        (".*connection.*", Strategy::ReverseInner),
        ("foo|bar|baz", Strategy::Teddy),
        (r"\d+\.\d+\.\d+", Strategy::DigitPrefilter),
        ("[a-z]+[0-9]+", Strategy::CompositeSearcher),
        ("[a-z]+", Strategy::CharClassSearcher),
        (r"(\w+)@(\w+)\.(\w+)", Strategy::BoundedBacktracker),
    ];
    for &(pattern, want) in table {
        let re = compile(pattern).unwrap();
        assert_eq!(re.strategy(), want, "for pattern {:?}", pattern);
    }
}
