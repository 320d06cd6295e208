//! 命令行集成测试
//!
//! 直接运行 `scrape-router` 二进制，检查标准输出只包含命令结果，
//! 日志全部写入标准错误。

use std::process::Command;

use tempfile::TempDir;

const ROUTES_YAML: &str = r#"
logging:
  level: debug
routes:
  - path: /user/:id
  - path: /user/*
    scraper: dynamic
"#;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("routes.yaml");
    std::fs::write(&path, ROUTES_YAML).unwrap();
    path
}

#[test]
fn test_route_json_stdout_is_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    let output = Command::new(env!("CARGO_BIN_EXE_scrape-router"))
        .arg("-c")
        .arg(&config)
        .args(["-l", "debug", "route", "/user/7", "/nowhere", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 2, "unexpected stdout: {stdout}");

    let values: Vec<serde_json::Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(values[0]["url"], "/user/7");
    assert_eq!(values[0]["matched"], true);
    assert_eq!(values[0]["matches"].as_array().unwrap().len(), 2);
    assert_eq!(values[1]["url"], "/nowhere");
    assert_eq!(values[1]["matched"], false);

    // 日志仍然输出，只是去了标准错误
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("route completed"));
    assert!(stderr.contains("no route matched"));
}

#[test]
fn test_compile_prints_regex() {
    let output = Command::new(env!("CARGO_BIN_EXE_scrape-router"))
        .args(["compile", "/user/:id"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("/user/:id"));
    assert!(stdout.contains("url, id"));
}
