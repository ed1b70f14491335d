use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{CallerStrategy, GeneKey, StageKind};

pub const SUBMISSION_SCRIPT: &str = "example-qsub.sh";
const OUTPUT_PREFIX: &str = "pypgx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: Utf8PathBuf,
}

impl RunLayout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn genes_dir(&self) -> Utf8PathBuf {
        self.root.join("gene")
    }

    pub fn gene_dir(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.genes_dir().join(gene.as_str())
    }

    pub fn shell_dir(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join("shell")
    }

    pub fn log_dir(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join("log")
    }

    pub fn script_path(&self, gene: &GeneKey, kind: StageKind) -> Utf8PathBuf {
        self.shell_dir(gene).join(kind.script_name())
    }

    pub fn staged_dir(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join("bam2vcf2")
    }

    pub fn staged_conf(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join("conf.txt")
    }

    pub fn vcf_path(&self, gene: &GeneKey, caller: CallerStrategy) -> Utf8PathBuf {
        let dir = match caller {
            CallerStrategy::Direct => self.gene_dir(gene),
            CallerStrategy::Staged => self.staged_dir(gene),
        };
        dir.join(format!("{OUTPUT_PREFIX}.vcf"))
    }

    pub fn gdf_path(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join(format!("{OUTPUT_PREFIX}.gdf"))
    }

    pub fn genotype_dir(&self, gene: &GeneKey) -> Utf8PathBuf {
        self.gene_dir(gene).join("stargazer")
    }

    pub fn bam_list_path(&self) -> Utf8PathBuf {
        self.root.join("bam-list.txt")
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join("plan.json")
    }

    pub fn submission_path(&self) -> Utf8PathBuf {
        self.root.join(SUBMISSION_SCRIPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = RunLayout::new(Utf8PathBuf::from("/runs/p1"));
        let gene: GeneKey = "cyp2d6".parse().unwrap();

        assert_eq!(
            layout.script_path(&gene, StageKind::GenotypeInfer),
            "/runs/p1/gene/cyp2d6/shell/genotype-infer.sh"
        );
        assert_eq!(layout.log_dir(&gene), "/runs/p1/gene/cyp2d6/log");
        assert_eq!(
            layout.vcf_path(&gene, CallerStrategy::Staged),
            "/runs/p1/gene/cyp2d6/bam2vcf2/pypgx.vcf"
        );
        assert_eq!(layout.submission_path(), "/runs/p1/example-qsub.sh");
    }
}
