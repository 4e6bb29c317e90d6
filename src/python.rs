use numpy::PyArray1;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::ensemble::{EnsembleOptions, run_ensemble};
use crate::error::SimError;
use crate::loader::NetworkDocument;
use crate::method::Method;

impl From<SimError> for PyErr {
    fn from(err: SimError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

#[pyfunction(signature = (
    document,
    method="direct",
    trajectories=1,
    seed=None,
    families=None,
    n_threads=None
))]
pub fn simulate(
    py: Python<'_>,
    document: &str,
    method: &str,
    trajectories: usize,
    seed: Option<u64>,
    families: Option<usize>,
    n_threads: Option<usize>,
) -> PyResult<Py<PyAny>> {
    let network = NetworkDocument::from_json_str(document)?.into_network()?;
    let method = match (method.parse::<Method>()?, families) {
        (Method::FamilyPartitioned { .. }, Some(families)) => {
            Method::FamilyPartitioned { families }
        }
        (parsed, _) => parsed,
    };
    let options = EnsembleOptions {
        method,
        trajectories,
        n_threads,
        seed,
    };
    let results = py.detach(move || run_ensemble(&network, &options))?;

    let output = PyList::empty(py);
    for trajectory in results {
        let entry = PyDict::new(py);
        entry.set_item("time", PyArray1::from_vec(py, trajectory.time))?;
        for (name, values) in trajectory.species {
            entry.set_item(name, PyArray1::from_vec(py, values))?;
        }
        entry.set_item("equilibrium", trajectory.equilibrium.to_string())?;
        entry.set_item("steps", trajectory.steps)?;
        output.append(entry)?;
    }
    Ok(output.into_any().unbind())
}

#[pymodule]
fn gillespie(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(simulate, module)?)?;
    Ok(())
}
