#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serveflow::config::FlowConfig;

const ATHEISM: [&str; 4] = [
    "Atheists reject belief in gods and argue from evidence and reason.",
    "The burden of proof lies with the claim; atheism withholds belief.",
    "Secular ethics need no deity; reason and evidence suffice for atheists.",
    "Many atheists describe religion as unsupported by evidence.",
];

const CHRISTIAN: [&str; 4] = [
    "The church gathers on Sunday to pray and read scripture together.",
    "Christ taught forgiveness; the gospel calls every believer to grace.",
    "Prayer, scripture and the sacraments shape Christian life in the church.",
    "The gospel of Christ brings grace and salvation to the faithful.",
];

/// Writes a small corpus in the 20 Newsgroups "bydate" train layout.
pub fn write_corpus(data_home: &Path) {
    write_category(data_home, "alt.atheism", &ATHEISM);
    write_category(data_home, "soc.religion.christian", &CHRISTIAN);
}

fn write_category(data_home: &Path, category: &str, documents: &[&str]) {
    let dir = data_home.join("20news-bydate-train").join(category);
    fs::create_dir_all(&dir).expect("create category directory");
    for (idx, body) in documents.iter().enumerate() {
        fs::write(dir.join(format!("{}", 51000 + idx)), body).expect("write document");
    }
}

/// Default config pointed at a scratch work directory and corpus.
pub fn scratch_config(root: &Path) -> (FlowConfig, PathBuf) {
    let data_home = root.join("data");
    write_corpus(&data_home);
    let work_dir = root.join("work");
    fs::create_dir_all(&work_dir).expect("create work directory");

    let mut config = FlowConfig::default();
    config.work_dir = work_dir.clone();
    config.training.data_home = data_home;
    (config, work_dir)
}
