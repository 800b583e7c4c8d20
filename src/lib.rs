pub mod configuration;

pub mod induction {
    pub mod inductionerror;
    pub mod gittins;
    pub mod bayes;
    pub mod tablebuilder;
}

pub mod math {
    pub mod curve {
        pub mod curve;
        pub mod nonparametriccurve {
            pub mod nonparametriccurve;
            pub mod quadraticsegment;
            pub mod splineerror;
            pub mod valuespline;
        }
    }
    pub mod gaussian;
    pub mod rootfinding;
}

pub mod scheduler {
    pub mod pool;
}

pub mod table {
    pub mod tableerror;
    pub mod gittinstable;
    pub mod bayestable;
}
