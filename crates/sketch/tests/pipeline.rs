use sketch::instrument::erase_types;
use sketch::{
    CapturedValue, LogKind, Playground, PlaygroundConfig, RunScheduler, Sandbox, SandboxLimits, correlate, instrument,
};
use std::time::Duration;

fn run(source: &str) -> sketch::ExecutionOutcome {
    let instrumented = instrument(source).unwrap();
    Sandbox::default().run(&instrumented, &mut |_| {})
}

fn result_texts(source: &str) -> Vec<(usize, String)> {
    run(source)
        .results
        .iter()
        .map(|result| (result.line, result.text()))
        .collect()
}

#[test]
fn one_result_per_bare_expression_in_source_order() {
    let source = "\
interface Point { x: number; y: number }
const p: Point = { x: 1, y: 2 }
p.x + p.y
console.log(p)
p.x * 10
type Id = string
'done'";
    assert_eq!(
        result_texts(source),
        vec![(3, "3".to_string()), (5, "10".to_string()), (7, "'done'".to_string())]
    );
}

#[test]
fn typed_functions_and_classes_run() {
    let source = "\
class Counter<T> implements Countable {
  private count: number = 0
  constructor(public label: string) {}
  increment(by: number = 1): Counter<T> {
    this.count += by
    return this
  }
  total(): number { return this.count }
}
const counter = new Counter('clicks')
const total = counter.increment().increment(5).total()
total
counter.label
function first<T>(items: T[]): T | undefined { return items[0] }
first([7, 8])
const pair: [number, string] = [1, 'a']
pair.length";
    let texts: Vec<String> = result_texts(source).into_iter().map(|(_, text)| text).collect();
    assert_eq!(texts, vec!["6", "'clicks'", "7", "2"]);
}

#[test]
fn unsupported_syntax_is_reported() {
    for source in ["import x from 'y'", "function* numbers() {}", "function f() { await g() }"] {
        let error = instrument(source).unwrap_err();
        assert_eq!(error.kind(), "SyntaxError", "{source}");
    }
}

#[test]
fn logs_keep_call_order_across_display_modes() {
    let source = "for (let i = 0; i < 3; i++) console.log(i)\nconsole.warn('end')";
    let outcome = run(source);
    let texts: Vec<String> = outcome.logs.iter().map(|entry| entry.text()).collect();
    assert_eq!(texts, vec!["0", "1", "2", "'end'"]);

    let serial = correlate(source, &outcome.logs, &outcome.results, false);
    let serial_texts: Vec<String> = serial.lines.values().map(|output| output.text()).collect();
    assert_eq!(serial_texts, texts);

    // Only the `console.log` line claims a log; the warn line gets none.
    let aligned = correlate(source, &outcome.logs, &outcome.results, true);
    assert_eq!(aligned.get(1).map(|output| output.text()), Some("0".to_string()));
    assert!(aligned.get(2).is_none());
}

#[test]
fn aligned_mode_places_logs_and_results() {
    let source = "console.log('x')\nconst y = 1\ny";
    let outcome = run(source);
    let view = correlate(source, &outcome.logs, &outcome.results, true);
    assert_eq!(view.get(1).map(|output| output.text()), Some("'x'".to_string()));
    assert_eq!(view.get(3).map(|output| output.text()), Some("1".to_string()));
    assert!(view.get(2).is_none());
}

#[test]
fn instrumentation_is_idempotent() {
    let once = instrument("const a = 1\na\na + 1").unwrap();
    let twice = instrument(&once.code).unwrap();
    assert_eq!(once.code, twice.code);
    assert_eq!(twice.captures, 2);
}

#[test]
fn erasure_preserves_lines_and_removes_types() {
    let source = "let n: number = 1\nfunction f(a: string,\n  b?: number): void {}\ntype T = { a: string }\nn as unknown as string";
    let erased = erase_types(source).unwrap();
    assert_eq!(erased.lines().count(), source.lines().count());
    for fragment in [": number", ": string", ": void", "type T", " as "] {
        assert!(!erased.contains(fragment), "{fragment:?} left in {erased:?}");
    }
}

#[test]
fn syntax_error_is_a_single_error_entry() {
    let mut playground = Playground::default();
    playground.run("1\n2");
    playground.run("1 +");
    let outcome = playground.outcome();
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.logs.len(), 1);
    assert_eq!(outcome.logs[0].kind, LogKind::Error);
    match &outcome.logs[0].values[..] {
        [CapturedValue::String(message)] => assert!(message.starts_with("SyntaxError:")),
        values => panic!("unexpected values {values:?}"),
    }
}

#[test]
fn values_format_like_the_console() {
    let texts: Vec<String> = result_texts("({ a: 1, b: [true] })\nundefined\nnull\n'quoted'\n0 * -1\n1e21\n0.0000001")
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(
        texts,
        vec![r#"{"a":1,"b":[true]}"#, "undefined", "null", "'quoted'", "0", "1e+21", "1e-7"]
    );
}

#[test]
fn infinite_loop_hits_the_step_limit() {
    let instrumented = instrument("while (true) {}").unwrap();
    let limits = SandboxLimits {
        max_steps: 10_000,
        ..SandboxLimits::default()
    };
    let outcome = Sandbox::new(limits).run(&instrumented, &mut |_| {});
    let last = outcome.logs.last().map(|entry| entry.text());
    assert_eq!(last, Some("'RangeError: Execution step limit exceeded'".to_string()));
}

#[test]
fn builtins_behave() {
    let source = "\
[3, 1, 2].sort().map((n) => n * 2).join('-')
'a,b,,c'.split(',').filter(Boolean).length
JSON.stringify(JSON.parse('{\"b\":1,\"a\":[1,2]}'))
new Map([['k', 1]]).get('k')
new Set([1, 1, 2]).size
'Hello World'.replace(new RegExp('o', 'g'), '0')
Math.max(1, 5, 3)
Number('12.50').toFixed(1)
Object.entries({ a: 1 }).flat()
const letters = [...'abc']
letters.reverse().join('')
String(`${1 + 1} items`)
new Date(0).toISOString()
parseInt('ff', 16)
encodeURIComponent('a b&c')";
    let texts: Vec<String> = result_texts(source).into_iter().map(|(_, text)| text).collect();
    assert_eq!(
        texts,
        vec![
            "'2-4-6'",
            "3",
            r#"'{"b":1,"a":[1,2]}'"#,
            "1",
            "2",
            "'Hell0 W0rld'",
            "5",
            "'12.5'",
            r#"["a",1]"#,
            // The capture re-runs `letters.reverse()` after the script body.
            "'abc'",
            "'2 items'",
            "'1970-01-01T00:00:00.000Z'",
            "255",
            "'a%20b%26c'",
        ]
    );
}

#[test]
fn everyday_javascript_syntax_runs() {
    let source = "\
const vowels = /[aeiou]+/g
'queueing'.replace(vowels, '_')
let hits = 0, misses = 10
for (let a = 0, b = 4; a < b; a++, b--) hits += 1
hits
enum Color { Red, Green = 5, Blue }
Color.Blue
Color[5]
const enum Size { Small = 's', Large = 'l' }
Size.Large
outer: for (const x of [1, 2, 3]) {
  for (const y of [1, 2]) {
    if (x === 2) continue outer
    if (x === 3) break outer
    misses -= y
  }
}
misses
const tag = (strings: TemplateStringsArray, ...values: number[]) => strings.raw.join('|') + values.join(',')
tag`a${1}b\\n${2}c`
String.raw`x\\ny`.length
const half = 10 / 2 / 1
half";
    let texts: Vec<String> = result_texts(source).into_iter().map(|(_, text)| text).collect();
    assert_eq!(
        texts,
        vec!["'q_ng'", "2", "6", "'Green'", "'l'", "7", r"'a|b\n|c1,2'", "4", "5"]
    );
}

#[test]
fn enums_lower_to_two_way_objects() {
    let outcome = run("enum Direction { Up = 1, Down }\nenum Direction { Left = 10 }\nDirection");
    assert_eq!(
        outcome.results[0].text(),
        r#"{"1":"Up","2":"Down","10":"Left","Up":1,"Down":2,"Left":10}"#
    );
    let outcome = run("enum Mixed { A = 'a', B }");
    assert_eq!(
        outcome.failure.map(|error| error.to_string()),
        Some("TypeError: Enum member must have initializer.".to_string())
    );
}

#[test]
fn closures_and_destructuring() {
    let source = "\
const makeCounter = () => { let n = 0; return () => ++n }
const next = makeCounter()
let last = next()
last = next()
last
const { a, b: [, second] = [], ...rest } = { a: 1, b: [2, 3], c: 4, d: 5 }
second + a
rest
const sum = (...xs: number[]) => xs.reduce((total, x) => total + x, 0)
sum(1, 2, 3)";
    let texts: Vec<String> = result_texts(source).into_iter().map(|(_, text)| text).collect();
    assert_eq!(texts, vec!["2", "4", r#"{"c":4,"d":5}"#, "6"]);
}

#[test]
fn playground_honors_configured_limits() {
    let config = PlaygroundConfig::from_toml("[sandbox]\nmax_steps = 100\n").unwrap();
    let mut playground = Playground::new(&config);
    playground.run("let i = 0\nwhile (i < 1000) i++\ni");
    assert!(playground.outcome().is_failure());
}

#[tokio::test(start_paused = true)]
async fn debounced_edits_run_only_the_last_source() {
    let mut scheduler = RunScheduler::new(Duration::from_millis(500));
    let mut playground = Playground::default();
    for source in ["1", "1 +", "1 + 2"] {
        scheduler.submit(source);
        tokio::time::advance(Duration::from_millis(100)).await;
    }
    let results = scheduler
        .run_next(|source| playground.run(source).lines.len())
        .await;
    assert_eq!(results, 1);
    assert_eq!(playground.source(), "1 + 2");
    assert_eq!(playground.outcome().results[0].text(), "3");
}
