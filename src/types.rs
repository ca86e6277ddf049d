/// Coarse stage of a research run. Ordered so that progress comparisons are
/// a plain `<`/`>`; a run only ever moves forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Search,
    Enrichment,
    Curation,
    Briefing,
    Complete,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Search => "Search",
            Self::Enrichment => "Enrichment",
            Self::Curation => "Curation",
            Self::Briefing => "Briefing",
            Self::Complete => "Complete",
        }
    }

    /// Map a `step` string from the wire onto a phase. Steps that are not
    /// phase markers (e.g. analyst names) return `None`.
    pub fn from_step(step: &str) -> Option<Self> {
        match step {
            "Search" => Some(Self::Search),
            "Enriching" => Some(Self::Enrichment),
            "Curation" => Some(Self::Curation),
            "Briefing" => Some(Self::Briefing),
            _ => None,
        }
    }
}

/// Topical bucket for generated queries and enrichment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Company,
    Industry,
    Financial,
    Fundamental,
    News,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Company,
        Self::Industry,
        Self::Financial,
        Self::Fundamental,
        Self::News,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Industry => "industry",
            Self::Financial => "financial",
            Self::Fundamental => "fundamental",
            Self::News => "news",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "company" => Some(Self::Company),
            "industry" => Some(Self::Industry),
            "financial" => Some(Self::Financial),
            "fundamental" => Some(Self::Fundamental),
            "news" => Some(Self::News),
            _ => None,
        }
    }
}

/// One of the four final-report subsections whose completion is tracked
/// independently during the briefing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BriefingSection {
    Company,
    Industry,
    Financial,
    News,
}

impl BriefingSection {
    pub const ALL: [BriefingSection; 4] =
        [Self::Company, Self::Industry, Self::Financial, Self::News];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Industry => "industry",
            Self::Financial => "financial",
            Self::News => "news",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "company" => Some(Self::Company),
            "industry" => Some(Self::Industry),
            "financial" => Some(Self::Financial),
            "news" => Some(Self::News),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BriefingSection, Category, Phase};

    #[test]
    fn phase_ordering_is_monotonic() {
        assert!(Phase::Idle < Phase::Search);
        assert!(Phase::Search < Phase::Enrichment);
        assert!(Phase::Enrichment < Phase::Curation);
        assert!(Phase::Curation < Phase::Briefing);
        assert!(Phase::Briefing < Phase::Complete);
    }

    #[test]
    fn phase_from_step_recognizes_markers() {
        assert_eq!(Phase::from_step("Search"), Some(Phase::Search));
        assert_eq!(Phase::from_step("Enriching"), Some(Phase::Enrichment));
        assert_eq!(Phase::from_step("Curation"), Some(Phase::Curation));
        assert_eq!(Phase::from_step("Briefing"), Some(Phase::Briefing));
        assert_eq!(Phase::from_step("Fundamental Analyst"), None);
    }

    #[test]
    fn category_roundtrip() {
        for cat in Category::ALL {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(Category::parse("valuation"), None);
    }

    #[test]
    fn briefing_section_roundtrip() {
        for section in BriefingSection::ALL {
            assert_eq!(BriefingSection::parse(section.as_str()), Some(section));
        }
        assert_eq!(BriefingSection::parse("fundamental"), None);
    }
}
