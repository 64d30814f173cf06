//! APA and BibTeX citations for search results.

use chrono::Datelike;
use clap::ValueEnum;
use papertalk_core::PaperSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CitationFormat {
    Apa,
    Bibtex,
    #[default]
    Both,
}

fn year(paper: &PaperSummary) -> String {
    paper
        .published
        .map(|d| d.year().to_string())
        .unwrap_or_else(|| "n.d.".to_string())
}

fn title(paper: &PaperSummary) -> &str {
    paper.title.trim().trim_matches('.').trim()
}

fn authors(paper: &PaperSummary) -> String {
    paper.authors.join(", ")
}

/// `<authors> (<year>). <title>. arXiv:<id>`
pub fn apa(paper: &PaperSummary) -> String {
    format!(
        "{} ({}). {}. arXiv:{}",
        authors(paper),
        year(paper),
        title(paper),
        paper.id
    )
}

/// Citation key: first author's surname followed by the year.
fn bibtex_key(paper: &PaperSummary) -> String {
    let surname: String = paper
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .unwrap_or("Unknown")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    let year = paper.published.map(|d| d.year().to_string()).unwrap_or_default();
    format!("{}{}", surname, year)
}

pub fn bibtex(paper: &PaperSummary) -> String {
    format!(
        "@article{{{key}, title={{ {title} }}, author={{ {authors} }}, year={{ {year} }}, \
         eprint={{ {id} }}, archivePrefix={{arXiv}}, primaryClass={{ {category} }} }}",
        key = bibtex_key(paper),
        title = title(paper),
        authors = authors(paper),
        year = year(paper),
        id = paper.id,
        category = paper.primary_category.as_deref().unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use papertalk_core::PaperId;

    fn paper() -> PaperSummary {
        PaperSummary {
            id: PaperId::new("2102.12092v2"),
            title: "Zero-Shot Text-to-Image Generation.".into(),
            authors: vec!["Aditya Ramesh".into(), "Mikhail Pavlov".into()],
            published: NaiveDate::from_ymd_opt(2021, 2, 24),
            summary: "We describe a simple approach.".into(),
            entry_url: "http://arxiv.org/abs/2102.12092v2".into(),
            primary_category: Some("cs.CV".into()),
        }
    }

    #[test]
    fn apa_strips_trailing_period() {
        assert_eq!(
            apa(&paper()),
            "Aditya Ramesh, Mikhail Pavlov (2021). Zero-Shot Text-to-Image Generation. arXiv:2102.12092v2"
        );
    }

    #[test]
    fn bibtex_uses_surname_and_year_key() {
        assert_eq!(
            bibtex(&paper()),
            "@article{Ramesh2021, title={ Zero-Shot Text-to-Image Generation }, \
             author={ Aditya Ramesh, Mikhail Pavlov }, year={ 2021 }, eprint={ 2102.12092v2 }, \
             archivePrefix={arXiv}, primaryClass={ cs.CV } }"
        );
    }

    #[test]
    fn missing_date_and_authors() {
        let mut p = paper();
        p.published = None;
        p.authors.clear();
        assert!(apa(&p).contains("(n.d.)"));
        assert!(bibtex(&p).starts_with("@article{Unknown, "));
    }
}
