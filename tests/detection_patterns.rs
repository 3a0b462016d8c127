use label_migrate::config::{Config, StrategyKind};
use label_migrate::detect::ast::check_syntax;
use label_migrate::detect::{detect_source, Classification, Occurrence, TextSite};
use label_migrate::fs::RealFileSystem;
use label_migrate::identity::{self, synthesize};
use label_migrate::migrate::Migrator;
use label_migrate::rewrite::{apply_edits, plan_edit};
use label_migrate::source::SourceText;
use label_migrate::store::{JsonLabelStore, LabelStore, MemoryLabelStore};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn detect(text: &str, path: &str) -> Vec<Occurrence> {
    detect_source(&SourceText::new(path, text), &Config::default()).occurrences
}

fn detect_with(text: &str, path: &str, strategy: StrategyKind) -> Vec<Occurrence> {
    let config = Config {
        strategies: vec![strategy],
        ..Config::default()
    };
    detect_source(&SourceText::new(path, text), &config).occurrences
}

const SAMPLE: &str = r#"import React from 'react';
import { Modal } from './Modal';

// 这是注释，不应该被检测
/* 多行注释
   也不应该 */
export function LoginForm({ onSubmit }: Props) {
  const title = '用户登录';
  const url = "https://example.com/登录";
  return (
    <form className="login-form" onSubmit={onSubmit}>
      <h1>{title}</h1>
      <input placeholder="Enter name" aria-label="用户名" />
      <Modal title="Close dialog" />
      <button type="submit">确认</button>
      <p>Forgot your password?</p>
    </form>
  );
}
"#;

#[test]
fn button_with_cjk_text() {
    for strategy in [StrategyKind::Ast, StrategyKind::Line] {
        let found = detect_with("<button>确认</button>\n", "a.tsx", strategy);
        assert_eq!(found.len(), 1, "{:?}", strategy);
        assert_eq!(found[0].classification, Classification::Cjk);
        assert_eq!(found[0].raw_text, "确认");
        assert_eq!(found[0].site, TextSite::JsxText);
    }
    let id = synthesize(&detect("<button>确认</button>\n", "a.tsx")[0], &Config::default()).unwrap();
    assert_eq!(id.scope, "common");
    assert!(id.key.starts_with("text_"));
}

#[test]
fn import_statement_is_ignored() {
    for strategy in [StrategyKind::Ast, StrategyKind::Line] {
        assert!(detect_with("import Foo from './Foo'\n", "a.ts", strategy).is_empty());
    }
}

#[test]
fn placeholder_attribute_in_english() {
    for strategy in [StrategyKind::Ast, StrategyKind::Line] {
        let found = detect_with("<input placeholder=\"Enter name\" />\n", "a.tsx", strategy);
        assert_eq!(found.len(), 1, "{:?}", strategy);
        assert_eq!(found[0].classification, Classification::JsxAttribute);
        assert_eq!(found[0].raw_text, "Enter name");
    }
}

#[test]
fn english_detection_can_be_disabled() {
    let config = Config {
        detect_jsx_english: false,
        ..Config::default()
    };
    let source = SourceText::new("a.tsx", "<input placeholder=\"Enter name\" title=\"标题\" />\n");
    let found = detect_source(&source, &config).occurrences;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].raw_text, "标题");
}

#[test]
fn sample_component_occurrences() {
    let found = detect(SAMPLE, "LoginForm.tsx");
    let texts: Vec<&str> = found.iter().map(|o| o.raw_text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "用户登录",
            "Enter name",
            "用户名",
            "Close dialog",
            "确认",
            "Forgot your password?"
        ]
    );
    for occ in &found {
        assert_eq!(&SAMPLE[occ.byte_span.clone()], occ.raw_text);
        assert_eq!(occ.context_name.as_deref(), Some("LoginForm"));
    }
}

#[test]
fn detection_is_idempotent() {
    let first = detect(SAMPLE, "LoginForm.tsx");
    let second = detect(SAMPLE, "LoginForm.tsx");
    assert_eq!(first, second);
}

#[test]
fn rewriting_two_literals_on_one_line() {
    let text = "const a = '确认'; const b = '取消操作';\n";
    let found = detect(text, "a.ts");
    assert_eq!(found.len(), 2);
    let edits: Vec<_> = found
        .iter()
        .enumerate()
        .map(|(i, occ)| {
            let key = identity::label_key(&occ.value).unwrap();
            plan_edit(text, occ, i, &format!("labels.{}", key)).unwrap()
        })
        .collect();
    let outcome = apply_edits(text, &edits);
    assert_eq!(outcome.applied, vec![1, 0]);

    let expected = format!(
        "const a = labels.{}; const b = labels.{};\n",
        identity::label_key("确认").unwrap(),
        identity::label_key("取消操作").unwrap()
    );
    assert_eq!(outcome.text, expected);
    assert!(detect(&outcome.text, "a.ts").is_empty());
}

#[test]
fn migration_reaches_fixed_point() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    let file = root.join("src/LoginForm.tsx");
    fs::write(&file, SAMPLE).unwrap();

    let config = Config {
        root: root.display().to_string(),
        ..Config::default()
    };
    let store = JsonLabelStore::new(RealFileSystem, config.store_path());
    let files: Vec<PathBuf> = vec![file.clone()];

    let first = Migrator::new(&config, &RealFileSystem, &store).run(&files);
    assert!(first.success, "{:?}", first.errors);
    assert_eq!(first.occurrences_found, 6);
    assert_eq!(first.migrated_labels_count, 6);
    assert_eq!(first.labels_written, 6);

    let rewritten = fs::read_to_string(&file).unwrap();
    assert!(rewritten.contains("const title = labels."));
    assert!(rewritten.contains("placeholder={labels.enter_name}"));
    assert!(rewritten.contains("<Modal title={labels.close_dialog} />"));
    assert!(rewritten.contains("<p>{labels.forgot_your_password}</p>"));
    assert!(rewritten.contains("// 这是注释，不应该被检测"));
    assert!(rewritten.contains("\"https://example.com/登录\""));
    check_syntax(&SourceText::new(file.display().to_string(), rewritten.as_str())).unwrap();

    assert_eq!(store.count_by_scope("loginFormView").unwrap(), 6);
    assert_eq!(
        store.get("loginFormView", "enter_name", "zh").unwrap().as_deref(),
        Some("Enter name")
    );

    let second = Migrator::new(&config, &RealFileSystem, &store).run(&files);
    assert_eq!(second.occurrences_found, 0);
    assert_eq!(second.migrated_labels_count, 0);
    assert_eq!(fs::read_to_string(&file).unwrap(), rewritten);
}

#[test]
fn repeated_text_across_files_is_stored_once() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    let mut files = Vec::new();
    for name in ["a.ts", "b.ts", "c.ts"] {
        let path = root.join("src").join(name);
        fs::write(&path, "export const SAVE = '保存成功';\n").unwrap();
        files.push(path);
    }

    let config = Config {
        root: root.display().to_string(),
        ..Config::default()
    };
    let store = MemoryLabelStore::new();
    let result = Migrator::new(&config, &RealFileSystem, &store).run(&files);

    assert_eq!(result.migrated_labels_count, 3);
    assert_eq!(result.labels_written, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.count_by_scope("common").unwrap(), 1);
}

#[test]
fn unparseable_file_falls_back_to_line_detection() {
    let text = "const broken = <div>确认\n";
    let detection = detect_source(&SourceText::new("broken.tsx", text), &Config::default());
    assert_eq!(detection.occurrences.len(), 1);
    assert_eq!(detection.occurrences[0].strategy, StrategyKind::Line);
    assert!(detection.warnings.iter().any(|w| w.contains("parse error")));
}

#[test]
fn line_strategy_keeps_markup_around_apostrophes() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    let file = root.join("src/Note.tsx");
    fs::write(
        &file,
        "export const Note = () => <div><p>It's 确认</p><p>that's ok</p></div>;\n",
    )
    .unwrap();

    let config = Config {
        root: root.display().to_string(),
        strategies: vec![StrategyKind::Line],
        detect_jsx_english: false,
        ..Config::default()
    };
    let store = MemoryLabelStore::new();
    let result = Migrator::new(&config, &RealFileSystem, &store).run(&[file.clone()]);
    assert_eq!(result.migrated_labels_count, 1, "{:?}", result.warnings);

    let key = identity::label_key("It's 确认").unwrap();
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        format!(
            "export const Note = () => <div><p>{{labels.{}}}</p><p>that's ok</p></div>;\n",
            key
        )
    );
    assert_eq!(
        store.get("common", &key, "zh").unwrap().as_deref(),
        Some("It's 确认")
    );
}

#[test]
fn generic_class_header_does_not_block_migration() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    let file = root.join("src/store.ts");
    fs::write(
        &file,
        "export class Store<T> extends Base<T> {\n  title = '用户登录';\n}\n",
    )
    .unwrap();

    let config = Config {
        root: root.display().to_string(),
        ..Config::default()
    };
    let store = MemoryLabelStore::new();
    let result = Migrator::new(&config, &RealFileSystem, &store).run(&[file.clone()]);
    assert_eq!(result.occurrences_found, 1);
    assert_eq!(result.migrated_labels_count, 1);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let key = identity::label_key("用户登录").unwrap();
    let rewritten = fs::read_to_string(&file).unwrap();
    assert!(rewritten.contains(&format!("title = labels.{};", key)), "{}", rewritten);
    assert_eq!(store.count_by_scope("storeView").unwrap(), 1);
}
