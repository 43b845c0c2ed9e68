use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};

use super::ExtractionError;
use super::schema::SchemaSelectors;
use super::source::{FetchRequest, PageSource};

struct CatalogEntry {
    title: &'static str,
    description: &'static str,
    path: &'static str,
}

const COLECTIVOS: [CatalogEntry; 5] = [
    CatalogEntry {
        title: "Seguros Colectivos para Empresas | Sura",
        description: "Protege a tus colaboradores con planes de salud, vida y ahorro a precios preferenciales. Nuestros seguros colectivos ofrecen beneficios exclusivos para empresas de todos los tamaños.",
        path: "/empresas/seguros-colectivos",
    },
    CatalogEntry {
        title: "Seguros de Vida Colectivos | Sura",
        description: "El seguro de vida colectivo protege a tus colaboradores con coberturas por fallecimiento, invalidez y enfermedades graves. Incluye beneficios adicionales como asistencia funeral y adelanto de capital.",
        path: "/empresas/seguros-colectivos/vida",
    },
    CatalogEntry {
        title: "Seguros de Salud Colectivos | Sura",
        description: "Ofrece acceso a los mejores centros médicos con reembolsos por gastos médicos, cobertura dental y beneficios de medicamentos. Planes personalizados según las necesidades de tu empresa.",
        path: "/empresas/seguros-colectivos/salud",
    },
    CatalogEntry {
        title: "Planes de Ahorro Colectivos | Sura",
        description: "Facilita a tus colaboradores acumular un capital a través de aportes sistemáticos, con beneficios tributarios para empresas. Planes de inversión con rentabilidad competitiva.",
        path: "/empresas/seguros-colectivos/ahorro",
    },
    CatalogEntry {
        title: "Preguntas Frecuentes sobre Seguros Colectivos | Sura",
        description: "Resolvemos tus dudas sobre la contratación, coberturas y beneficios de los seguros colectivos. Información clara sobre cómo funcionan los planes para empresas.",
        path: "/empresas/seguros-colectivos/preguntas-frecuentes",
    },
];

/// Offline page source backed by a built-in catalog of SURA pages.
///
/// Renders the same markup the live search page uses, so results still go
/// through the regular schema parser.
pub struct CatalogSource {
    selectors: SchemaSelectors,
}

impl CatalogSource {
    pub fn new(selectors: SchemaSelectors) -> Self {
        CatalogSource { selectors }
    }

    fn entries_for(term: &str) -> Vec<(String, String, String)> {
        if term.to_lowercase().contains("colectivo") {
            return COLECTIVOS
                .iter()
                .map(|e| {
                    (
                        e.title.to_string(),
                        e.description.to_string(),
                        e.path.to_string(),
                    )
                })
                .collect();
        }

        let slug = term.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
        let capitalized = capitalize(term);
        vec![
            (
                format!("Resultados para: {term} | Sura"),
                format!("Información sobre {term} disponible en Seguros Sura Chile."),
                format!("/busqueda?q={slug}"),
            ),
            (
                format!("Seguros de {capitalized} | Sura"),
                format!("Conoce nuestras soluciones de seguros relacionadas con {term}."),
                format!("/productos/{slug}"),
            ),
            (
                format!("Servicio al cliente - {capitalized} | Sura"),
                format!("Consulta información sobre nuestros servicios de {term} para clientes."),
                format!("/servicio-cliente/{slug}"),
            ),
        ]
    }

    /// Renders a results page for `term`. Only simple `tag.class` selectors
    /// are reproduced; anything else falls back to the default markup.
    pub fn render(&self, term: &str) -> String {
        let defaults = SchemaSelectors::default();
        let pick = |custom: &str, fallback: &str, tag: &str| -> (String, String) {
            let (custom_tag, class) = split_simple(custom)
                .or_else(|| split_simple(fallback))
                .unwrap_or((None, String::new()));
            (custom_tag.unwrap_or_else(|| tag.to_string()), class)
        };
        let (container_tag, container_class) =
            pick(&self.selectors.container, &defaults.container, "div");
        let (item_tag, item_class) = pick(&self.selectors.item, &defaults.item, "article");
        let (title_tag, title_class) = pick(&self.selectors.title, &defaults.title, "h3");
        let (link_tag, link_class) = pick(&self.selectors.link, &defaults.link, "a");
        let (desc_tag, desc_class) =
            pick(&self.selectors.description, &defaults.description, "p");

        let mut html = String::from("<!DOCTYPE html><html lang=\"es\"><head><title>Búsqueda | Seguros SURA</title></head><body>");
        html.push_str(&format!("<{container_tag} class=\"{container_class}\">"));
        for (title, description, path) in Self::entries_for(term) {
            html.push_str(&format!(
                "<{item_tag} class=\"{item_class}\"><{link_tag} class=\"{link_class}\" href=\"{}\"><{title_tag} class=\"{title_class}\">{}</{title_tag}></{link_tag}><{desc_tag} class=\"{desc_class}\">{}</{desc_tag}></{item_tag}>",
                encode_double_quoted_attribute(&path),
                encode_text(&title),
                encode_text(&description),
            ));
        }
        html.push_str(&format!("</{container_tag}></body></html>"));
        html
    }
}

#[async_trait]
impl PageSource for CatalogSource {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionError> {
        Ok(self.render(&request.term))
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `tag.class` or `.class` into (tag, class).
fn split_simple(selector: &str) -> Option<(Option<String>, String)> {
    let (tag, class) = selector.trim().split_once('.')?;
    let valid = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if class.is_empty() || !valid(tag) || !valid(class) {
        return None;
    }
    let tag = (!tag.is_empty()).then(|| tag.to_string());
    Some((tag, class.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::schema::ResultSchema;
    use reqwest::Url;

    fn page_url() -> Url {
        Url::parse("https://seguros.sura.cl/busqueda?q=x").unwrap()
    }

    #[test]
    fn test_colectivos_catalog_parses() {
        let source = CatalogSource::new(SchemaSelectors::default());
        let html = source.render("Seguros Colectivos");
        let outcome = ResultSchema::default().parse(&html, &page_url(), 10).unwrap();
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.items.len(), 5);
        assert_eq!(
            outcome.items[1].url,
            "https://seguros.sura.cl/empresas/seguros-colectivos/vida"
        );
    }

    #[test]
    fn test_generic_term_is_escaped() {
        let source = CatalogSource::new(SchemaSelectors::default());
        let html = source.render("hogar <b>");
        assert!(html.contains("Resultados para: hogar &lt;b&gt; | Sura"));
        let outcome = ResultSchema::default().parse(&html, &page_url(), 10).unwrap();
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(outcome.items[0].title, "Resultados para: hogar <b> | Sura");
        assert_eq!(outcome.items[1].title, "Seguros de Hogar <b> | Sura");
    }

    #[test]
    fn test_custom_selectors_round_into_markup() {
        let selectors = SchemaSelectors {
            container: "ul.hits".to_string(),
            item: "li.hit".to_string(),
            ..Default::default()
        };
        let schema = ResultSchema::compile(selectors.clone()).unwrap();
        let html = CatalogSource::new(selectors).render("auto");
        let outcome = schema.parse(&html, &page_url(), 10).unwrap();
        assert_eq!(outcome.items.len(), 3);
    }

    #[test]
    fn test_split_simple() {
        assert_eq!(
            split_simple("div.search-results"),
            Some((Some("div".to_string()), "search-results".to_string()))
        );
        assert_eq!(
            split_simple(".result-title"),
            Some((None, "result-title".to_string()))
        );
        assert_eq!(split_simple("article[data-x]"), None);
        assert_eq!(split_simple("div > a.link"), None);
    }
}
