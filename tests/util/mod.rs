use northwind_bi::PipelineInput;
use northwind_bi::model::{RawTable, RawValue};
use std::path::PathBuf;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }

    /// Number of captured lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.output().lines().filter(|l| l.contains(needle)).count()
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<std::ffi::OsStr>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Path of a checked-in fixture under `tests/fixtures/`.
#[allow(dead_code)]
pub fn fixture_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel)
}

/// The small two-order Northwind sample.
#[allow(dead_code)]
pub fn sample_input() -> PipelineInput {
    PipelineInput::from_path(&fixture_path("northwind/sample.json")).expect("sample fixture")
}

#[allow(dead_code)]
pub struct TempFixtureDir {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TempFixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Write `contents` to `name` inside the directory and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }
}

/// Builder for raw order-detail tables: `(order_id, product, qty, price)`,
/// no discount.
#[allow(dead_code)]
pub fn order_details(lines: &[(i64, &str, f64, f64)]) -> RawTable {
    let discounted: Vec<_> = lines
        .iter()
        .map(|&(order, product, qty, price)| (order, product, qty, price, 0.0))
        .collect();
    discounted_order_details(&discounted)
}

/// Builder for raw order-detail tables:
/// `(order_id, product, qty, price, discount)`.
#[allow(dead_code)]
pub fn discounted_order_details(lines: &[(i64, &str, f64, f64, f64)]) -> RawTable {
    let mut raw = RawTable::new(["Order ID", "Product", "Quantity", "Unit Price", "Discount"]);
    for &(order, product, qty, price, discount) in lines {
        raw.rows.push(vec![
            RawValue::from(order),
            RawValue::from(product),
            RawValue::from(qty),
            RawValue::from(price),
            RawValue::from(discount),
        ]);
    }
    raw
}

/// Builder for raw product tables: `(name, standard_cost, category)`.
#[allow(dead_code)]
pub fn products(rows: &[(&str, f64, &str)]) -> RawTable {
    let mut raw = RawTable::new(["Product Name", "Standard Cost", "Category"]);
    for &(name, cost, category) in rows {
        raw.rows.push(vec![
            RawValue::from(name),
            RawValue::from(cost),
            RawValue::from(category),
        ]);
    }
    raw
}
