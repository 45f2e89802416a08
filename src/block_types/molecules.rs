//! Molecules block (id 2). The topology tree
//! molecule → chain → residue → atom, plus a flat bond list and the
//! per-molecule-type instance counts that expand the tree into the
//! trajectory's real particles.
//!
//! Stored as flat arenas with index ranges rather than parent
//! back-pointers; identifiers are unique only within their parent.

use std::io::Cursor;

use binrw::BinReaderExt;

use crate::TngError;

use super::{read_string, write_string};

/// One of the atoms of a bond and the other atom of the bond,
/// as ids into the owning molecule's atom list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub from_atom_id: i64,
    pub to_atom_id: i64,
}

/// An atom within a residue.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Unique (per residue) id.
    pub id: i64,
    pub name: String,
    /// Forcefield-dependent atom type.
    pub atom_type: String,
}

/// A residue within a chain. Holds a range into the molecule's
/// atom arena.
#[derive(Debug, Clone)]
pub struct Residue {
    /// Unique (per chain) id.
    pub id: i64,
    pub name: String,
    pub(crate) first_atom: usize,
    pub(crate) n_atoms: usize,
}

/// A chain within a molecule. Holds a range into the molecule's
/// residue arena.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Unique (per molecule) id.
    pub id: i64,
    pub name: String,
    pub(crate) first_residue: usize,
    pub(crate) n_residues: usize,
}

/// A molecule type: chains, residues and atoms in flat arenas,
/// plus the bond list.
#[derive(Debug, Clone)]
pub struct Molecule {
    /// Unique id of the molecule type.
    pub id: i64,
    pub name: String,
    /// Quaternary structure: 1 monomeric, 2 dimeric, etc.
    pub quaternary: i64,
    pub(crate) chains: Vec<Chain>,
    pub(crate) residues: Vec<Residue>,
    pub(crate) atoms: Vec<Atom>,
    pub(crate) bonds: Vec<Bond>,
}

impl Molecule {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            quaternary: 1,
            chains: Vec::new(),
            residues: Vec::new(),
            atoms: Vec::new(),
            bonds: Vec::new(),
        }
    }

    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn n_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn n_bonds(&self) -> usize {
        self.bonds.len()
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Residues of `chain`, resolved through the residue arena.
    pub fn chain_residues(&self, chain: &Chain) -> &[Residue] {
        &self.residues[chain.first_residue..chain.first_residue + chain.n_residues]
    }

    /// Atoms of `residue`, resolved through the atom arena.
    pub fn residue_atoms(&self, residue: &Residue) -> &[Atom] {
        &self.atoms[residue.first_atom..residue.first_atom + residue.n_atoms]
    }

    /// Appends a chain. Subsequent residues are added to it.
    pub fn add_chain(&mut self, id: i64, name: &str) -> Result<(), TngError> {
        if self.chains.iter().any(|c| c.id == id) {
            return Err(TngError::InvariantBroken(format!(
                "duplicate chain id {id} in molecule '{}'",
                self.name
            )));
        }
        self.chains.push(Chain {
            id,
            name: name.to_owned(),
            first_residue: self.residues.len(),
            n_residues: 0,
        });
        Ok(())
    }

    /// Appends a residue to the most recently added chain.
    pub fn add_residue(&mut self, id: i64, name: &str) -> Result<(), TngError> {
        let chain = self.chains.last_mut().ok_or_else(|| {
            TngError::InvariantBroken(format!("no chain to add residue to in '{}'", self.name))
        })?;
        let span = chain.first_residue..chain.first_residue + chain.n_residues;
        if self.residues[span].iter().any(|r| r.id == id) {
            return Err(TngError::InvariantBroken(format!(
                "duplicate residue id {id} in chain {}",
                chain.id
            )));
        }
        chain.n_residues += 1;
        self.residues.push(Residue {
            id,
            name: name.to_owned(),
            first_atom: self.atoms.len(),
            n_atoms: 0,
        });
        Ok(())
    }

    /// Appends an atom to the most recently added residue.
    pub fn add_atom(&mut self, id: i64, name: &str, atom_type: &str) -> Result<(), TngError> {
        let residue = self.residues.last_mut().ok_or_else(|| {
            TngError::InvariantBroken(format!("no residue to add atom to in '{}'", self.name))
        })?;
        let span = residue.first_atom..residue.first_atom + residue.n_atoms;
        if self.atoms[span].iter().any(|a| a.id == id) {
            return Err(TngError::InvariantBroken(format!(
                "duplicate atom id {id} in residue {}",
                residue.id
            )));
        }
        residue.n_atoms += 1;
        self.atoms.push(Atom {
            id,
            name: name.to_owned(),
            atom_type: atom_type.to_owned(),
        });
        Ok(())
    }

    pub fn add_bond(&mut self, from_atom_id: i64, to_atom_id: i64) {
        self.bonds.push(Bond {
            from_atom_id,
            to_atom_id,
        });
    }
}

/// Molecules block (id 2): the molecule types of the trajectory and
/// the count of instances of each type.
#[derive(Debug, Clone, Default)]
pub struct Molecules {
    pub(crate) molecules: Vec<Molecule>,
    /// Instance count per molecule type, parallel to `molecules`.
    pub(crate) cnt_list: Vec<i64>,
}

impl Molecules {
    pub fn new(molecules: Vec<Molecule>, cnt_list: Vec<i64>) -> Result<Self, TngError> {
        if molecules.len() != cnt_list.len() {
            return Err(TngError::InvariantBroken(format!(
                "{} molecule types but {} counts",
                molecules.len(),
                cnt_list.len()
            )));
        }
        Ok(Self {
            molecules,
            cnt_list,
        })
    }

    /// Number of different kinds of molecules.
    pub fn n_molecule_types(&self) -> i64 {
        self.molecules.len() as i64
    }

    /// Total number of molecule instances.
    pub fn n_molecules(&self) -> i64 {
        self.cnt_list.iter().sum()
    }

    /// Total number of real particles once each molecule type is
    /// expanded by its instance count.
    pub fn n_particles(&self) -> i64 {
        self.molecules
            .iter()
            .zip(self.cnt_list.iter())
            .map(|(m, cnt)| m.n_atoms() as i64 * cnt)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Molecule> {
        self.molecules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Molecule> {
        self.molecules.get(index)
    }

    /// Instance count for the molecule type at `index`.
    pub fn cnt(&self, index: usize) -> Option<i64> {
        self.cnt_list.get(index).copied()
    }

    /// Returns the first molecule type with the specified name.
    pub fn find(&self, name: &str) -> Option<&Molecule> {
        self.molecules.iter().find(|m| m.name == name)
    }

    pub(crate) fn decode(crs: &mut Cursor<Vec<u8>>, max_str_len: u64) -> Result<Self, TngError> {
        let n_molecules = crs.read_le::<i64>()?;
        if n_molecules < 0 {
            return Err(TngError::SchemaMismatch(format!(
                "negative molecule count {n_molecules}"
            )));
        }

        let mut molecules = Vec::with_capacity(n_molecules as usize);
        for _ in 0..n_molecules {
            molecules.push(decode_molecule(crs, max_str_len)?);
        }

        let mut cnt_list = Vec::with_capacity(n_molecules as usize);
        for _ in 0..n_molecules {
            let cnt = crs.read_le::<i64>()?;
            if cnt < 0 {
                return Err(TngError::SchemaMismatch(format!(
                    "negative molecule instance count {cnt}"
                )));
            }
            cnt_list.push(cnt);
        }

        if molecules
            .iter()
            .map(|m| m.id)
            .collect::<std::collections::HashSet<_>>()
            .len()
            != molecules.len()
        {
            return Err(TngError::SchemaMismatch("duplicate molecule id".into()));
        }

        Ok(Self {
            molecules,
            cnt_list,
        })
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.molecules.len() as i64).to_le_bytes());
        for molecule in &self.molecules {
            encode_molecule(&mut buf, molecule);
        }
        for cnt in &self.cnt_list {
            buf.extend_from_slice(&cnt.to_le_bytes());
        }
        buf
    }
}

fn decode_molecule(crs: &mut Cursor<Vec<u8>>, max_str_len: u64) -> Result<Molecule, TngError> {
    let id = crs.read_le::<i64>()?;
    let name = read_string(crs, max_str_len)?;
    let quaternary = crs.read_le::<i64>()?;
    let n_chains = crs.read_le::<i64>()? as usize;
    let n_residues = crs.read_le::<i64>()? as usize;
    let n_atoms = crs.read_le::<i64>()? as usize;
    let n_bonds = crs.read_le::<i64>()? as usize;

    let mut chains = Vec::with_capacity(n_chains);
    let mut first_residue = 0_usize;
    for _ in 0..n_chains {
        let chain_id = crs.read_le::<i64>()?;
        let chain_name = read_string(crs, max_str_len)?;
        let chain_residues = crs.read_le::<i64>()? as usize;
        if chains.iter().any(|c: &Chain| c.id == chain_id) {
            return Err(TngError::SchemaMismatch(format!(
                "duplicate chain id {chain_id} in molecule '{name}'"
            )));
        }
        chains.push(Chain {
            id: chain_id,
            name: chain_name,
            first_residue,
            n_residues: chain_residues,
        });
        first_residue += chain_residues;
    }
    if first_residue != n_residues {
        return Err(TngError::SchemaMismatch(format!(
            "chain residue counts sum to {first_residue}, molecule declares {n_residues}"
        )));
    }

    let mut residues = Vec::with_capacity(n_residues);
    let mut first_atom = 0_usize;
    for _ in 0..n_residues {
        let residue_id = crs.read_le::<i64>()?;
        let residue_name = read_string(crs, max_str_len)?;
        let residue_atoms = crs.read_le::<i64>()? as usize;
        residues.push(Residue {
            id: residue_id,
            name: residue_name,
            first_atom,
            n_atoms: residue_atoms,
        });
        first_atom += residue_atoms;
    }
    if first_atom != n_atoms {
        return Err(TngError::SchemaMismatch(format!(
            "residue atom counts sum to {first_atom}, molecule declares {n_atoms}"
        )));
    }
    // residue ids are unique within their chain
    for chain in &chains {
        let span = &residues[chain.first_residue..chain.first_residue + chain.n_residues];
        let distinct = span
            .iter()
            .map(|r| r.id)
            .collect::<std::collections::HashSet<_>>();
        if distinct.len() != span.len() {
            return Err(TngError::SchemaMismatch(format!(
                "duplicate residue id in chain {}",
                chain.id
            )));
        }
    }

    let mut atoms = Vec::with_capacity(n_atoms);
    for _ in 0..n_atoms {
        let atom_id = crs.read_le::<i64>()?;
        let atom_name = read_string(crs, max_str_len)?;
        let atom_type = read_string(crs, max_str_len)?;
        atoms.push(Atom {
            id: atom_id,
            name: atom_name,
            atom_type,
        });
    }
    // atom ids are unique within their residue
    for residue in &residues {
        let span = &atoms[residue.first_atom..residue.first_atom + residue.n_atoms];
        let distinct = span
            .iter()
            .map(|a| a.id)
            .collect::<std::collections::HashSet<_>>();
        if distinct.len() != span.len() {
            return Err(TngError::SchemaMismatch(format!(
                "duplicate atom id in residue {}",
                residue.id
            )));
        }
    }

    let mut bonds = Vec::with_capacity(n_bonds);
    for _ in 0..n_bonds {
        let from_atom_id = crs.read_le::<i64>()?;
        let to_atom_id = crs.read_le::<i64>()?;
        bonds.push(Bond {
            from_atom_id,
            to_atom_id,
        });
    }

    Ok(Molecule {
        id,
        name,
        quaternary,
        chains,
        residues,
        atoms,
        bonds,
    })
}

fn encode_molecule(buf: &mut Vec<u8>, molecule: &Molecule) {
    buf.extend_from_slice(&molecule.id.to_le_bytes());
    write_string(buf, &molecule.name);
    buf.extend_from_slice(&molecule.quaternary.to_le_bytes());
    buf.extend_from_slice(&(molecule.chains.len() as i64).to_le_bytes());
    buf.extend_from_slice(&(molecule.residues.len() as i64).to_le_bytes());
    buf.extend_from_slice(&(molecule.atoms.len() as i64).to_le_bytes());
    buf.extend_from_slice(&(molecule.bonds.len() as i64).to_le_bytes());
    for chain in &molecule.chains {
        buf.extend_from_slice(&chain.id.to_le_bytes());
        write_string(buf, &chain.name);
        buf.extend_from_slice(&(chain.n_residues as i64).to_le_bytes());
    }
    for residue in &molecule.residues {
        buf.extend_from_slice(&residue.id.to_le_bytes());
        write_string(buf, &residue.name);
        buf.extend_from_slice(&(residue.n_atoms as i64).to_le_bytes());
    }
    for atom in &molecule.atoms {
        buf.extend_from_slice(&atom.id.to_le_bytes());
        write_string(buf, &atom.name);
        write_string(buf, &atom.atom_type);
    }
    for bond in &molecule.bonds {
        buf.extend_from_slice(&bond.from_atom_id.to_le_bytes());
        buf.extend_from_slice(&bond.to_atom_id.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Molecule {
        let mut mol = Molecule::new(0, "water");
        mol.add_chain(0, "W").unwrap();
        mol.add_residue(0, "SOL").unwrap();
        mol.add_atom(0, "O", "O").unwrap();
        mol.add_atom(1, "HO1", "H").unwrap();
        mol.add_atom(2, "HO2", "H").unwrap();
        mol.add_bond(0, 1);
        mol.add_bond(0, 2);
        mol
    }

    #[test]
    fn build_and_round_trip() {
        let molecules = Molecules::new(vec![water()], vec![5]).unwrap();
        assert_eq!(molecules.n_molecule_types(), 1);
        assert_eq!(molecules.n_molecules(), 5);
        assert_eq!(molecules.n_particles(), 15);

        let mut crs = Cursor::new(molecules.encode());
        let decoded = Molecules::decode(&mut crs, 1024).unwrap();
        assert_eq!(decoded.n_particles(), 15);
        let mol = decoded.find("water").expect("water should be present");
        assert_eq!(mol.n_chains(), 1);
        assert_eq!(mol.n_residues(), 1);
        assert_eq!(mol.n_atoms(), 3);
        assert_eq!(mol.n_bonds(), 2);
        let residues = mol.chain_residues(&mol.chains()[0]);
        assert_eq!(mol.residue_atoms(&residues[0]).len(), 3);
        assert!(decoded.find("argon").is_none());
    }

    #[test]
    fn duplicate_atom_id_rejected() {
        let mut mol = Molecule::new(0, "broken");
        mol.add_chain(0, "A").unwrap();
        mol.add_residue(0, "R").unwrap();
        mol.add_atom(0, "C1", "C").unwrap();
        assert!(mol.add_atom(0, "C2", "C").is_err());
    }

    #[test]
    fn count_mismatch_rejected() {
        let molecules = Molecules::new(vec![water()], vec![5]).unwrap();
        let mut bytes = molecules.encode();
        // corrupt the declared atom count (field after the molecule
        // count, id, name, quaternary, n_chains, n_residues)
        let off = 8 + 8 + (8 + 5) + 8 + 8 + 8;
        bytes[off..off + 8].copy_from_slice(&99_i64.to_le_bytes());
        assert!(matches!(
            Molecules::decode(&mut Cursor::new(bytes), 1024),
            Err(TngError::SchemaMismatch(_))
        ));
    }
}
