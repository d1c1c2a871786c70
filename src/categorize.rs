/// Label returned when no keyword matches.
pub const OTHER: &str = "Other";

/// Ordered (label, keywords) table. The first label with a matching keyword
/// wins, so a keyword listed under two labels belongs to the earlier one.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Informatique / IT",
        &[
            "informatique",
            "développeur",
            "developpeur",
            "developer",
            "programmeur",
            "logiciel",
            "software",
            "réseau",
            "reseau",
            "système",
            "systeme",
            "data analyst",
            "data scientist",
            "data engineer",
            "données",
            "devops",
            "web",
            "technicien",
        ],
    ),
    (
        "Finance / Comptabilité",
        &[
            "comptab",
            "finance",
            "financier",
            "financière",
            "audit",
            "trésor",
            "fiscal",
            "banque",
            "crédit",
            "credit",
            "caissier",
        ],
    ),
    (
        "Communication / Marketing",
        &[
            "communication",
            "marketing",
            "commercial",
            "vente",
            "community manager",
            "relations publiques",
            "journaliste",
            "graphiste",
        ],
    ),
    (
        "Conseil / Stratégie",
        &[
            "consultant",
            "conseil",
            "stratégie",
            "strategie",
            "strategy",
            "business analyst",
        ],
    ),
    (
        "Transport / Logistique",
        &[
            "transport",
            "logisti",
            "chauffeur",
            "magasinier",
            "supply chain",
            "approvisionnement",
            "douane",
            "transit",
        ],
    ),
    (
        "Ingénierie / BTP",
        &[
            "ingénieur",
            "ingenieur",
            "engineer",
            "génie civil",
            "genie civil",
            "construction",
            "btp",
            "chantier",
            "électricien",
            "electricien",
            "mécanicien",
            "mecanicien",
            "technicien",
            "architecte",
        ],
    ),
    (
        "Santé / Médical",
        &[
            "médecin",
            "medecin",
            "médical",
            "medical",
            "infirmi",
            "santé",
            "pharmac",
            "sage-femme",
            "laborantin",
            "nutrition",
        ],
    ),
];

/// Map a job title to its coarse category label.
pub fn categorize(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(label, _)| *label)
        .unwrap_or(OTHER)
}

/// All labels `categorize` can return, in table order, `Other` last.
pub fn labels() -> impl Iterator<Item = &'static str> {
    CATEGORIES
        .iter()
        .map(|(label, _)| *label)
        .chain(std::iter::once(OTHER))
}
