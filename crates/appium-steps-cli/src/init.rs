//! `init`: scaffold a WebdriverIO + Cucumber project that uses the pre-built
//! steps.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::{json, Map, Value};

const APK_NAME: &str = "ApiDemos-debug.apk";
const APK_DOWNLOAD_URL: &str =
    "https://github.com/appium/appium/raw/master/packages/appium/sample-code/apps/ApiDemos-debug.apk";
const SCENARIOS_SOURCE: &str = "test-scenarios";
const STEPS_PACKAGE: &str = "appium-cucumber-steps";
const STEPS_PACKAGE_FALLBACK: &str = "^1.0.0";
const APPIUM_VERSION: &str = "^3.1.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    TypeScript,
    JavaScript,
}

impl Language {
    fn name(self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
        }
    }

    fn config_file(self) -> &'static str {
        match self {
            Language::TypeScript => "wdio.conf.ts",
            Language::JavaScript => "wdio.conf.js",
        }
    }
}

/// A file written verbatim into the new project.
struct Template {
    path: &'static str,
    contents: &'static str,
}

const TYPESCRIPT_TEMPLATES: &[Template] = &[
    Template {
        path: "wdio.conf.ts",
        contents: include_str!("../templates/wdio.conf.ts"),
    },
    Template {
        path: "features/support/hooks.ts",
        contents: include_str!("../templates/hooks.ts"),
    },
    Template {
        path: "features/support/world.ts",
        contents: include_str!("../templates/world.ts"),
    },
    Template {
        path: "features/step_definitions/steps.ts",
        contents: include_str!("../templates/steps.ts"),
    },
    Template {
        path: "tsconfig.json",
        contents: include_str!("../templates/tsconfig.json"),
    },
];

const JAVASCRIPT_TEMPLATES: &[Template] = &[
    Template {
        path: "wdio.conf.js",
        contents: include_str!("../templates/wdio.conf.js"),
    },
    Template {
        path: "features/support/hooks.js",
        contents: include_str!("../templates/hooks.js"),
    },
    Template {
        path: "features/support/world.js",
        contents: include_str!("../templates/world.js"),
    },
    Template {
        path: "features/step_definitions/steps.js",
        contents: include_str!("../templates/steps.js"),
    },
];

const README: Template = Template {
    path: "README.md",
    contents: include_str!("../templates/README.md"),
};

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// `None` asks on stdin.
    pub language: Option<Language>,
    pub project_dir: PathBuf,
    /// Where the sample app and scenarios are shipped.
    pub package_root: PathBuf,
}

/// What `init` left on disk.
#[derive(Debug, Default)]
pub struct InitSummary {
    pub written: Vec<PathBuf>,
    pub apk_copied: bool,
    pub scenarios_copied: usize,
}

/// The install prefix of the running binary (`<prefix>/bin/appium-steps`),
/// or the current directory when that cannot be determined.
pub fn default_package_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn run(options: &InitOptions) -> io::Result<InitSummary> {
    let language = match options.language {
        Some(language) => language,
        None => prompt_language(&mut io::stdin().lock(), &mut io::stdout())?,
    };
    let summary = scaffold(options, language)?;
    print_next_steps(language, &summary);
    Ok(summary)
}

/// Asks for TypeScript; anything but `y`/`yes` means JavaScript.
fn prompt_language(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Language> {
    write!(output, "Do you want to use TypeScript? (yes/no) [default: no]: ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> Language {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Language::TypeScript,
        _ => Language::JavaScript,
    }
}

fn scaffold(options: &InitOptions, language: Language) -> io::Result<InitSummary> {
    let root = &options.project_dir;
    println!("Initializing {} project in {}", language.name(), root.display());

    let mut summary = InitSummary::default();
    for dir in ["features/step_definitions", "features/support", "apps"] {
        fs::create_dir_all(root.join(dir))?;
    }

    let templates = match language {
        Language::TypeScript => TYPESCRIPT_TEMPLATES,
        Language::JavaScript => JAVASCRIPT_TEMPLATES,
    };
    for template in templates.iter().chain(std::iter::once(&README)) {
        let path = root.join(template.path);
        fs::write(&path, template.contents)?;
        println!("  created {}", template.path);
        summary.written.push(path);
    }

    let tsconfig = root.join("tsconfig.json");
    if language == Language::JavaScript && tsconfig.exists() {
        fs::remove_file(&tsconfig)?;
        println!("  removed tsconfig.json");
    }

    let dependency = match find_tarball(&options.package_root, root) {
        Some(tarball) => format!("file:{}", relative_to(&tarball, root).display()),
        None => {
            eprintln!(
                "warning: no {}-*.tgz found near {}; using the registry version",
                STEPS_PACKAGE,
                options.package_root.display()
            );
            STEPS_PACKAGE_FALLBACK.to_string()
        }
    };
    if let Some(path) = write_package_json(root, language, &dependency)? {
        summary.written.push(path);
    }

    summary.apk_copied = copy_apk(&options.package_root, root)?;
    summary.scenarios_copied = copy_scenarios(&options.package_root, root)?;
    Ok(summary)
}

/// Creates `package.json`, or merges the dependency and scripts into an
/// existing one. An existing file that is not valid JSON is left alone.
fn write_package_json(root: &Path, language: Language, dependency: &str) -> io::Result<Option<PathBuf>> {
    let path = root.join("package.json");
    let existing = if path.exists() {
        match serde_json::from_str::<Value>(&fs::read_to_string(&path)?) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) | Err(_) => {
                eprintln!("warning: package.json is not a JSON object, leaving it unchanged");
                return Ok(None);
            }
        }
    } else {
        None
    };

    let updated = existing.is_some();
    let pkg = package_json(existing, language, dependency);
    let text = serde_json::to_string_pretty(&pkg).map_err(io::Error::other)?;
    fs::write(&path, text + "\n")?;
    println!("  {} package.json", if updated { "updated" } else { "created" });
    Ok(Some(path))
}

fn package_json(existing: Option<Map<String, Value>>, language: Language, dependency: &str) -> Value {
    let mut pkg = existing.unwrap_or_else(|| {
        let mut map = Map::new();
        map.insert("name".into(), json!("my-appium-tests"));
        map.insert("version".into(), json!("1.0.0"));
        map
    });

    if language == Language::JavaScript {
        pkg.insert("type".into(), json!("commonjs"));
    }
    update_object(&mut pkg, "dependencies", |deps| {
        deps.insert(STEPS_PACKAGE.into(), json!(dependency));
    });
    update_object(&mut pkg, "devDependencies", |deps| {
        deps.insert("appium".into(), json!(APPIUM_VERSION));
    });

    let config = language.config_file();
    update_object(&mut pkg, "scripts", |scripts| {
        scripts.insert("test".into(), json!(format!("npx wdio run {}", config)));
        for tag in ["smoke", "navigation", "interaction", "assertions"] {
            scripts.insert(
                format!("test:{}", tag),
                json!(format!("npx wdio run {} --cucumberOpts.tags='@{}'", config, tag)),
            );
        }
        scripts.insert("appium".into(), json!("npx appium"));
    });

    Value::Object(pkg)
}

/// Applies `update` to the object under `key`, in place. A missing or
/// non-object value starts out empty.
fn update_object(map: &mut Map<String, Value>, key: &str, update: impl FnOnce(&mut Map<String, Value>)) {
    let slot = map.entry(key).or_insert(Value::Null);
    let mut inner = match slot.take() {
        Value::Object(inner) => inner,
        _ => Map::new(),
    };
    update(&mut inner);
    *slot = Value::Object(inner);
}

/// Newest packed steps tarball next to the package root or the project.
fn find_tarball(package_root: &Path, project: &Path) -> Option<PathBuf> {
    let dirs = [
        package_root.to_path_buf(),
        package_root.join(".."),
        project.join(".."),
        project.to_path_buf(),
    ];
    for dir in dirs {
        let pattern = dir.join(format!("{}-*.tgz", STEPS_PACKAGE));
        let Some(pattern) = pattern.to_str() else {
            continue;
        };
        let newest = glob::glob(pattern)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .max_by_key(|path| modified(path));
        if newest.is_some() {
            return newest;
        }
    }
    None
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn copy_apk(package_root: &Path, root: &Path) -> io::Result<bool> {
    let source = package_root.join("apps").join(APK_NAME);
    let dest = root.join("apps").join(APK_NAME);
    if !source.is_file() {
        eprintln!("warning: sample app not found at {}", source.display());
        eprintln!("  download it from {}", APK_DOWNLOAD_URL);
        eprintln!("  and save it to {}", dest.display());
        return Ok(false);
    }
    fs::copy(&source, &dest)?;
    println!("  copied apps/{}", APK_NAME);
    Ok(true)
}

/// Copies the shipped scenarios to `features/scenarios`, returning how many
/// files were copied. A missing source leaves an empty directory.
fn copy_scenarios(package_root: &Path, root: &Path) -> io::Result<usize> {
    let source = package_root.join(SCENARIOS_SOURCE);
    let dest = root.join("features").join("scenarios");
    if !source.is_dir() {
        eprintln!("warning: scenarios not found at {}", source.display());
        fs::create_dir_all(&dest)?;
        println!("  created empty features/scenarios");
        return Ok(0);
    }
    let copied = copy_dir(&source, &dest)?;
    println!("  copied {} scenario file(s) to features/scenarios", copied);
    Ok(copied)
}

fn copy_dir(source: &Path, dest: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn print_next_steps(language: Language, summary: &InitSummary) {
    println!();
    println!("Project initialized ({} files written).", summary.written.len());
    if !summary.apk_copied {
        println!("Download the sample app before running the tests (see warning above).");
    }
    println!();
    println!("Next steps:");
    println!("  1. npm install");
    println!("  2. npx appium driver install uiautomator2");
    println!("  3. Start an Android emulator");
    println!("  4. npm run appium");
    println!("  5. npm run test   (runs {})", language.config_file());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("appium-steps-init-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn options(project: &Path, package_root: &Path, language: Language) -> InitOptions {
        InitOptions {
            language: Some(language),
            project_dir: project.to_path_buf(),
            package_root: package_root.to_path_buf(),
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Language::TypeScript);
        assert_eq!(parse_answer(" YES "), Language::TypeScript);
        assert_eq!(parse_answer("no"), Language::JavaScript);
        assert_eq!(parse_answer(""), Language::JavaScript);
    }

    #[test]
    fn test_prompt_reads_one_line() {
        let mut input = io::Cursor::new(b"yes\nignored\n".to_vec());
        let mut output = Vec::new();
        let language = prompt_language(&mut input, &mut output).unwrap();
        assert_eq!(language, Language::TypeScript);
        assert!(String::from_utf8(output).unwrap().contains("TypeScript"));
    }

    #[test]
    fn test_typescript_scaffold() {
        let project = TempDir::new();
        let shipped = TempDir::new();
        let summary = scaffold(&options(&project.0, &shipped.0, Language::TypeScript), Language::TypeScript).unwrap();

        for file in [
            "wdio.conf.ts",
            "features/support/hooks.ts",
            "features/support/world.ts",
            "features/step_definitions/steps.ts",
            "tsconfig.json",
            "package.json",
            "README.md",
        ] {
            assert!(project.0.join(file).is_file(), "{} missing", file);
        }
        assert!(project.0.join("features/scenarios").is_dir());
        assert!(!summary.apk_copied);
        assert_eq!(summary.scenarios_copied, 0);

        let pkg: Value = serde_json::from_str(&fs::read_to_string(project.0.join("package.json")).unwrap()).unwrap();
        assert_eq!(pkg["scripts"]["test"], "npx wdio run wdio.conf.ts");
        assert!(pkg.get("type").is_none());
        assert_eq!(pkg["dependencies"][STEPS_PACKAGE], STEPS_PACKAGE_FALLBACK);
    }

    #[test]
    fn test_javascript_scaffold_removes_tsconfig() {
        let project = TempDir::new();
        let shipped = TempDir::new();
        fs::write(project.0.join("tsconfig.json"), "{}").unwrap();

        scaffold(&options(&project.0, &shipped.0, Language::JavaScript), Language::JavaScript).unwrap();
        assert!(!project.0.join("tsconfig.json").exists());
        assert!(project.0.join("wdio.conf.js").is_file());
        let pkg: Value = serde_json::from_str(&fs::read_to_string(project.0.join("package.json")).unwrap()).unwrap();
        assert_eq!(pkg["type"], "commonjs");
        assert_eq!(
            pkg["scripts"]["test:smoke"],
            "npx wdio run wdio.conf.js --cucumberOpts.tags='@smoke'"
        );
    }

    #[test]
    fn test_existing_package_json_is_merged() {
        let project = TempDir::new();
        let shipped = TempDir::new();
        fs::write(
            project.0.join("package.json"),
            r#"{"name":"mine","scripts":{"lint":"eslint ."},"dependencies":{"left-pad":"1.0.0"}}"#,
        )
        .unwrap();

        scaffold(&options(&project.0, &shipped.0, Language::JavaScript), Language::JavaScript).unwrap();
        let pkg: Value = serde_json::from_str(&fs::read_to_string(project.0.join("package.json")).unwrap()).unwrap();
        assert_eq!(pkg["name"], "mine");
        assert_eq!(pkg["scripts"]["lint"], "eslint .");
        assert_eq!(pkg["scripts"]["appium"], "npx appium");
        assert_eq!(pkg["dependencies"]["left-pad"], "1.0.0");
        assert_eq!(pkg["devDependencies"]["appium"], APPIUM_VERSION);
    }

    #[test]
    fn test_shipped_app_scenarios_and_tarball_are_used() {
        let project = TempDir::new();
        let shipped = TempDir::new();
        fs::create_dir_all(shipped.0.join("apps")).unwrap();
        fs::write(shipped.0.join("apps").join(APK_NAME), b"apk").unwrap();
        fs::create_dir_all(shipped.0.join("test-scenarios/nested")).unwrap();
        fs::write(shipped.0.join("test-scenarios/01-navigation.feature"), "Feature: a\n").unwrap();
        fs::write(shipped.0.join("test-scenarios/nested/02.feature"), "Feature: b\n").unwrap();
        fs::write(shipped.0.join("appium-cucumber-steps-1.2.0.tgz"), b"tgz").unwrap();

        let summary = scaffold(&options(&project.0, &shipped.0, Language::TypeScript), Language::TypeScript).unwrap();
        assert!(summary.apk_copied);
        assert_eq!(summary.scenarios_copied, 2);
        assert!(project.0.join("features/scenarios/nested/02.feature").is_file());

        let pkg: Value = serde_json::from_str(&fs::read_to_string(project.0.join("package.json")).unwrap()).unwrap();
        let dep = pkg["dependencies"][STEPS_PACKAGE].as_str().unwrap();
        assert!(dep.starts_with("file:"), "{}", dep);
        assert!(dep.ends_with("appium-cucumber-steps-1.2.0.tgz"), "{}", dep);
    }
}
